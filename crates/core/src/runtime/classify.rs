use crate::config::ClassifierConfig;
use crate::model::ChangeKind;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Maps filesystem paths to change kinds. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    solution_extensions: HashSet<String>,
    project_extensions: HashSet<String>,
    source_extensions: HashSet<String>,
    config_extensions: HashSet<String>,
    config_file_names: HashSet<String>,
    ignored_dirs: HashSet<String>,
}

fn lowered(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

impl ChangeClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            solution_extensions: lowered(&config.solution_extensions),
            project_extensions: lowered(&config.project_extensions),
            source_extensions: lowered(&config.source_extensions),
            config_extensions: lowered(&config.config_extensions),
            // File names keep their leading dot (".editorconfig").
            config_file_names: config
                .config_file_names
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            ignored_dirs: config
                .ignored_dirs
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignored_dirs.contains(&name.to_ascii_lowercase())
    }

    /// Classify `path` by file name and extension alone.
    pub fn classify(&self, path: &Path) -> Option<ChangeKind> {
        let file_name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if self.config_file_names.contains(&file_name) {
            return Some(ChangeKind::ConfigFile);
        }

        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        if self.solution_extensions.contains(&ext) {
            Some(ChangeKind::SolutionMeta)
        } else if self.project_extensions.contains(&ext) {
            Some(ChangeKind::ProjectMeta)
        } else if self.source_extensions.contains(&ext) {
            Some(ChangeKind::SourceFile)
        } else if self.config_extensions.contains(&ext) {
            Some(ChangeKind::ConfigFile)
        } else {
            None
        }
    }

    /// Classify `path` inside the workspace at `root`.
    ///
    /// Ignored directories only count below `root`; a path outside it is
    /// classified by name alone.
    pub fn classify_in(&self, root: &Path, path: &Path) -> Option<ChangeKind> {
        if let Ok(relative) = path.strip_prefix(root) {
            let parent = relative.parent().unwrap_or(Path::new(""));
            let ignored = parent.components().any(|c| match c {
                Component::Normal(name) => self.is_ignored_dir(&name.to_string_lossy()),
                _ => false,
            });
            if ignored {
                return None;
            }
        }
        self.classify(path)
    }
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}
