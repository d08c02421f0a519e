//! Path filtering for working copy change events

use folio_core::EditorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decides which paths produce change notifications
pub trait FileFilter: Send + Sync + std::fmt::Debug {
    /// Check if changes to `path` should be reported
    fn should_watch(&self, path: &Path) -> bool;

    /// How long to collect changes before reporting them
    fn debounce_duration(&self) -> Duration;

    fn filter_name(&self) -> &str {
        "unnamed"
    }
}

/// Ignores editor scratch files matched by glob patterns
#[derive(Debug, Clone)]
pub struct DefaultFileFilter {
    root: PathBuf,
    ignore_patterns: Vec<String>,
    debounce: Duration,
}

impl DefaultFileFilter {
    pub fn new(root: impl Into<PathBuf>, ignore_patterns: Vec<String>, debounce: Duration) -> Self {
        Self {
            root: root.into(),
            ignore_patterns,
            debounce,
        }
    }

    /// Build a filter for `root` from the editor settings
    pub fn from_config(root: impl Into<PathBuf>, config: &EditorConfig) -> Self {
        Self::new(
            root,
            config.ignore_patterns.clone(),
            Duration::from_millis(config.debounce_ms),
        )
    }

    fn is_ignored(&self, relative: &str, file_name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            // Patterns anchored with "**/" also apply to bare file names
            let bare = pattern.strip_prefix("**/").unwrap_or(pattern);
            glob_match::glob_match(pattern, relative) || glob_match::glob_match(bare, file_name)
        })
    }
}

impl FileFilter for DefaultFileFilter {
    fn should_watch(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = relative
            .components()
            .filter_map(|component| component.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");

        !self.is_ignored(&relative, file_name)
    }

    fn debounce_duration(&self) -> Duration {
        self.debounce
    }

    fn filter_name(&self) -> &str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> DefaultFileFilter {
        DefaultFileFilter::from_config("/work", &EditorConfig::default())
    }

    #[test]
    fn test_documents_are_watched() {
        let filter = filter();
        assert!(filter.should_watch(Path::new("/work/index.html")));
        assert!(filter.should_watch(Path::new("/work/docs/about.html")));
    }

    #[test]
    fn test_editor_scratch_files_are_ignored() {
        let filter = filter();
        assert!(!filter.should_watch(Path::new("/work/index.html.swp")));
        assert!(!filter.should_watch(Path::new("/work/docs/.index.html.swx")));
        assert!(!filter.should_watch(Path::new("/work/index.html~")));
        assert!(!filter.should_watch(Path::new("/work/.#index.html")));
        assert!(!filter.should_watch(Path::new("/work/4913")));
        assert!(!filter.should_watch(Path::new("/work/docs/draft.tmp")));
    }

    #[test]
    fn test_custom_patterns_and_debounce() {
        let filter = DefaultFileFilter::new(
            "/work",
            vec!["drafts/**".to_string()],
            Duration::from_millis(250),
        );
        assert!(!filter.should_watch(Path::new("/work/drafts/a.html")));
        assert!(filter.should_watch(Path::new("/work/a.html")));
        assert_eq!(filter.debounce_duration(), Duration::from_millis(250));
        assert_eq!(filter.filter_name(), "default");
    }
}
