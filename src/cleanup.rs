//! Removal of report directories once they have been digested.

use std::path::Path;

use tracing::{debug, warn};

/// Delete a report directory and its content.
///
/// Failures are logged and swallowed: a leftover directory must never turn
/// a successful digest into a failed one. Returns whether the directory is
/// gone afterwards.
pub fn delete_report_dir(directory: Option<&Path>) -> bool {
    let Some(directory) = directory else {
        return true;
    };

    match std::fs::remove_dir_all(directory) {
        Ok(()) => {
            debug!(dir = %directory.display(), "deleted report directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(
                dir = %directory.display(),
                error = %e,
                "failed to delete report directory"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deletes_directory_tree() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("report");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested").join("issues.json"), "[]").unwrap();

        assert!(delete_report_dir(Some(&dir)));
        assert!(!dir.exists());
    }

    #[test]
    fn test_none_and_missing_are_fine() {
        let tmp = TempDir::new().unwrap();
        assert!(delete_report_dir(None));
        assert!(delete_report_dir(Some(&tmp.path().join("gone"))));
    }
}
