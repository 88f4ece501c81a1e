//! Module extraction: workbook script project → text files on disk.

use crate::encoding::{self, EncodingError, TextEncoding};
use crate::host::{HostError, ModuleKind};
use crate::models::MacrosSettings;
use crate::services::document_session::DocumentSession;
use crate::services::transform;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Errors from module extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an extraction pass did for one workbook.
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    pub exported: usize,
    pub skipped: usize,
}

impl ExtractSummary {
    /// One-line description for the batch report.
    pub fn summary(&self) -> String {
        format!(
            "exported {} module(s), skipped {}",
            self.exported, self.skipped
        )
    }
}

/// Export the workbook's modules into `<macros.dir>/<book subdir>/`.
///
/// Modules are visited in collection order. Form modules are always skipped
/// (no portable text form), class modules are skipped unless configured in,
/// and modules with no meaningful body are skipped. Exported files come out
/// of the host in its native encoding and are rewritten into the configured
/// one when those differ.
///
/// The first failure aborts extraction for this workbook; the caller's
/// session release still runs.
pub fn extract_modules(
    session: &mut DocumentSession,
    macros: &MacrosSettings,
) -> Result<ExtractSummary, ExtractError> {
    let dest = module_dir(&macros.dir, session.path(), macros.book_dir_ext);
    fs::create_dir_all(&dest)?;

    let mut summary = ExtractSummary::default();
    let doc = session.document()?;

    for module in doc.modules()? {
        let name = module.name()?;
        let kind = module.kind()?;

        match kind {
            ModuleKind::FormBound => {
                tracing::debug!("Skipping form module {}", name);
                summary.skipped += 1;
                continue;
            }
            ModuleKind::ClassBased if !macros.include_class_modules => {
                tracing::debug!("Skipping class module {}", name);
                summary.skipped += 1;
                continue;
            }
            _ => {}
        }

        if module.line_count()? == 0 {
            tracing::debug!("Skipping empty module {}", name);
            summary.skipped += 1;
            continue;
        }
        let source = module.source_text()?;
        if transform::is_boilerplate_only(&source) {
            tracing::debug!("Skipping boilerplate-only module {}", name);
            summary.skipped += 1;
            continue;
        }

        let file_name = export_file_name(&name, kind, module.bound_object_name()?.as_deref());
        let target = dest.join(&file_name);
        module.export(&target)?;
        encoding::rewrite_file(&target, TextEncoding::host_native(), macros.encoding)?;
        tracing::debug!("Exported {} to {}", name, target);
        summary.exported += 1;
    }

    tracing::info!(
        "Extracted {} module(s) from {} ({} skipped)",
        summary.exported,
        session.path(),
        summary.skipped
    );
    Ok(summary)
}

/// The per-workbook directory module files live in, shared by extraction and
/// write-back so the two sides always agree.
pub(crate) fn module_dir(root: &Utf8Path, book: &Utf8Path, with_extension: bool) -> Utf8PathBuf {
    let name = if with_extension {
        book.file_name()
    } else {
        book.file_stem()
    };
    root.join(name.unwrap_or_default())
}

/// Export filename for a module. Document-bound modules carry the bound
/// object's name so two sheets' modules with the same declared name cannot
/// collide on disk.
fn export_file_name(name: &str, kind: ModuleKind, bound_object: Option<&str>) -> String {
    let ext = kind.file_extension();
    match (kind, bound_object) {
        (ModuleKind::DocumentBound, Some(bound)) => format!("{name} ({bound}).{ext}"),
        _ => format!("{name}.{ext}"),
    }
}
