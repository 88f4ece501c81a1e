//! Module write-back: text files on disk → workbook script project.

use crate::encoding::{self, EncodingError, TextEncoding};
use crate::host::{DocumentHandle, HostError, ModuleKind};
use crate::models::MacrosSettings;
use crate::services::document_session::DocumentSession;
use crate::services::extract::module_dir;
use crate::services::transform::{self, HOST_LINE_SEPARATOR};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use thiserror::Error;

/// Errors from module write-back.
#[derive(Error, Debug)]
pub enum WriteBackError {
    /// The workbook has no module directory to write back from.
    #[error("module directory {0} does not exist")]
    DirectoryNotFound(Utf8PathBuf),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a write-back pass did for one workbook.
#[derive(Debug, Clone, Default)]
pub struct WriteBackSummary {
    /// Document-bound modules overwritten in place.
    pub overwritten: usize,
    /// Free-standing modules imported (removing any previous version).
    pub imported: usize,
}

impl WriteBackSummary {
    /// One-line description for the batch report.
    pub fn summary(&self) -> String {
        format!(
            "overwrote {} module(s) in place, imported {}",
            self.overwritten, self.imported
        )
    }
}

/// Service that writes module files back into a workbook.
///
/// The module's canonical identifier is the quoted name on its
/// `Attribute VB_Name` line, never the filename, so renamed files keep
/// matching their module. Document-bound modules are overwritten in place
/// (they cannot be removed and re-created); everything else is removed and
/// re-imported.
pub struct ModuleWriter {
    /// Matches `Attribute VB_Name = "<identifier>"` and captures the
    /// identifier.
    name_pattern: Regex,
}

impl ModuleWriter {
    pub fn new() -> Self {
        Self {
            name_pattern: Regex::new(r#"^\s*Attribute\s+VB_Name\s*=\s*"([^"]*)""#)
                .expect("Invalid module name regex"),
        }
    }

    /// The identifier declared by a module file's metadata line, if any.
    pub fn declared_name(&self, text: &str) -> Option<String> {
        text.lines()
            .find_map(|line| self.name_pattern.captures(line))
            .map(|captures| captures[1].to_string())
    }

    /// Write every file in `<macros.dir>/<book subdir>/` back into the
    /// workbook, then save it.
    ///
    /// The first failure aborts write-back for this workbook; the caller's
    /// session release still runs.
    pub fn write_back(
        &self,
        session: &mut DocumentSession,
        macros: &MacrosSettings,
    ) -> Result<WriteBackSummary, WriteBackError> {
        let source_dir = module_dir(&macros.dir, session.path(), macros.book_dir_ext);
        if !source_dir.is_dir() {
            return Err(WriteBackError::DirectoryNotFound(source_dir));
        }

        let mut files: Vec<Utf8PathBuf> = Vec::new();
        for entry in fs::read_dir(&source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match Utf8PathBuf::from_path_buf(entry.path()) {
                Ok(path) => files.push(path),
                Err(path) => {
                    tracing::warn!("Skipping non-UTF-8 path {}", path.display());
                }
            }
        }
        files.sort();

        let mut summary = WriteBackSummary::default();
        for file in &files {
            self.write_module_file(session, file, macros, &mut summary)?;
        }

        session.save()?;
        tracing::info!(
            "Wrote {} module file(s) back into {} ({})",
            files.len(),
            session.path(),
            summary.summary()
        );
        Ok(summary)
    }

    fn write_module_file(
        &self,
        session: &mut DocumentSession,
        file: &Utf8Path,
        macros: &MacrosSettings,
        summary: &mut WriteBackSummary,
    ) -> Result<(), WriteBackError> {
        let text = encoding::read_to_string(file, macros.encoding)?;
        let name = self.declared_name(&text).unwrap_or_default();
        if name.is_empty() {
            // No identifier to match against; the file falls through to the
            // import path below
            tracing::warn!("{} has no Attribute VB_Name line", file);
        }

        let doc = session.document_mut()?;
        let existing = doc.find_module(&name)?;
        let existing_kind = match &existing {
            Some(module) => Some(module.kind()?),
            None => None,
        };

        match (existing, existing_kind) {
            (Some(mut module), Some(ModuleKind::DocumentBound)) => {
                let body = transform::strip_metadata_region(text.lines()).join(HOST_LINE_SEPARATOR);
                module.replace_body(&body)?;
                tracing::debug!("Overwrote document-bound module {} in place", name);
                summary.overwritten += 1;
            }
            (existing, _) => {
                if existing.is_some() {
                    // Drop the handle before asking the host to remove the
                    // module it points at
                    drop(existing);
                    match doc.remove_module(&name) {
                        Err(HostError::ModuleNotFound(_)) => {
                            tracing::debug!("Module {} vanished before removal", name);
                        }
                        other => other?,
                    }
                }
                import_file(doc, file, macros.encoding)?;
                tracing::debug!("Imported {}", file);
                summary.imported += 1;
            }
        }
        Ok(())
    }
}

impl Default for ModuleWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Import a module file, re-encoding into a temporary file first when the
/// configured encoding is not the host's native one (the host's import call
/// reads nothing else). The temporary file keeps the original extension and
/// is deleted once the import returns.
fn import_file(
    doc: &mut dyn DocumentHandle,
    file: &Utf8Path,
    file_encoding: TextEncoding,
) -> Result<(), WriteBackError> {
    if file_encoding.is_host_native() {
        doc.import_module(file)?;
        return Ok(());
    }

    let temp = encoding::reencode_to_temp(file, file_encoding, TextEncoding::host_native())?;
    let temp_path = Utf8Path::from_path(temp.path()).ok_or_else(|| {
        HostError::Call("temporary import file path is not valid UTF-8".to_string())
    })?;
    doc.import_module(temp_path)?;
    Ok(())
}
