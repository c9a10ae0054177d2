//! Unpacking of zipped report payloads.
//!
//! Reports arrive as one zip archive holding the components manifest and
//! the issues file. [`unpack_report`] extracts it into a fresh directory
//! that [`crate::digest::digest`] can then read.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Maximum decompressed bytes per archive entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Directory name for one submitted report inside the work directory.
pub fn report_dir_name(project_key: &str, snapshot_id: i64) -> String {
    let safe: String = project_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}-{}-{}", safe, snapshot_id, uuid::Uuid::new_v4().simple())
}

/// Extract `archive_path` into `dest`, which must not exist yet.
///
/// Entries whose names escape `dest` are rejected. On any extraction error
/// the partially written `dest` is removed again.
pub fn unpack_report(archive_path: &Path, dest: &Path) -> Result<PathBuf> {
    if dest.exists() {
        bail!("report directory already exists: {}", dest.display());
    }

    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open report archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", archive_path.display()))?;

    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create report directory: {}", dest.display()))?;

    if let Err(e) = extract_entries(&mut archive, dest) {
        crate::cleanup::delete_report_dir(Some(dest));
        return Err(e);
    }

    Ok(dest.to_path_buf())
}

fn extract_entries(archive: &mut zip::ZipArchive<File>, dest: &Path) -> Result<()> {
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            bail!("unsafe path in report archive: {}", entry.name());
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        let written = copy_bounded(&mut entry, &mut out, MAX_ENTRY_BYTES)
            .with_context(|| format!("Failed to unpack {}", out_path.display()))?;
        debug!(entry = %out_path.display(), bytes = written, "unpacked report entry");
    }
    Ok(())
}

// Copies at most `limit` bytes; one byte more means the entry is too large.
fn copy_bounded(reader: &mut impl Read, writer: &mut impl Write, limit: u64) -> Result<u64> {
    let written = std::io::copy(&mut reader.take(limit + 1), writer)?;
    if written > limit {
        bail!("entry exceeds size limit ({} bytes)", limit);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_unpack_report() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("report.zip");
        write_zip(
            &archive,
            &[("components.json", "[]"), ("issues.json", "[]")],
        );

        let dest = tmp.path().join("work").join("r1");
        let dir = unpack_report(&archive, &dest).unwrap();
        assert_eq!(fs::read_to_string(dir.join("components.json")).unwrap(), "[]");
        assert!(dir.join("issues.json").exists());
    }

    #[test]
    fn test_rejects_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("report.zip");
        write_zip(&archive, &[("issues.json", "[]")]);
        assert!(unpack_report(&archive, tmp.path()).is_err());
    }

    #[test]
    fn test_rejects_non_zip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("report.zip");
        fs::write(&archive, "report-data").unwrap();
        let err = unpack_report(&archive, &tmp.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("Not a zip archive"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("report.zip");
        write_zip(&archive, &[("../evil.json", "{}")]);
        let err = unpack_report(&archive, &tmp.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("unsafe path"));
        assert!(!tmp.path().join("evil.json").exists());
    }

    #[test]
    fn test_rejected_archive_leaves_no_partial_directory() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("report.zip");
        write_zip(
            &archive,
            &[("components.json", "[]"), ("../evil.json", "{}")],
        );

        let dest = tmp.path().join("work").join("r1");
        assert!(unpack_report(&archive, &dest).is_err());
        assert!(!dest.exists());
        assert!(tmp.path().join("work").exists());
    }

    #[test]
    fn test_entry_size_limit_is_inclusive() {
        let mut out = Vec::new();
        assert_eq!(copy_bounded(&mut &b"12345"[..], &mut out, 5).unwrap(), 5);
        assert_eq!(out, b"12345");

        let err = copy_bounded(&mut &b"123456"[..], &mut Vec::<u8>::new(), 5).unwrap_err();
        assert!(err.to_string().contains("size limit"));
    }

    #[test]
    fn test_report_dir_name_is_sanitized() {
        let name = report_dir_name("org.example:my project", 42);
        assert!(name.starts_with("org_example_my_project-42-"));
        assert!(!name.contains(':'));
    }
}
