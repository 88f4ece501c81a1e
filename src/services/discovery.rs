//! Candidate workbook discovery.
//!
//! Produces the ordered set of workbook paths a batch run will process:
//! every file in the source directory matching one of the configured
//! extensions, minus the explicitly excluded filenames, minus the host's
//! transient lock-marker files.

use crate::host::LOCK_FILE_PREFIX;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Find candidate workbooks in `dir`, non-recursively.
///
/// Extensions are matched case-insensitively and may be given with or
/// without the leading dot. Results are ordered per extension pass, sorted
/// by filename within each pass. An unreadable directory is not an error;
/// it yields an empty result the batch driver reports as nothing to do.
pub fn find_documents(
    dir: &Utf8Path,
    extensions: &[String],
    exclude: &[String],
) -> Vec<Utf8PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read source directory {}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => candidates.push(path),
            Err(path) => {
                tracing::warn!("Skipping non-UTF-8 path {}", path.display());
            }
        }
    }

    let mut files: Vec<Utf8PathBuf> = Vec::new();
    for ext in extensions {
        let normalized = normalize_extension(ext);
        let mut matched: Vec<Utf8PathBuf> = candidates
            .iter()
            .filter(|p| {
                p.extension()
                    .is_some_and(|e| format!(".{}", e.to_ascii_lowercase()) == normalized)
            })
            .cloned()
            .collect();
        matched.sort();
        for path in matched {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    files.retain(|path| {
        let Some(name) = path.file_name() else {
            return false;
        };
        if exclude.iter().any(|e| e == name) {
            tracing::debug!("Excluding {} (exclusion list)", path);
            return false;
        }
        if name.starts_with(LOCK_FILE_PREFIX) {
            tracing::debug!("Excluding {} (host lock-marker file)", path);
            return false;
        }
        true
    });

    tracing::debug!("Discovered {} candidate workbook(s) in {}", files.len(), dir);
    files
}

/// Normalize an extension filter to a lowercase `.ext` form.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
