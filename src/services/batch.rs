//! Sequential batch driver.
//!
//! Runs one synchronization mode over every discovered workbook: acquire the
//! host session once, then per workbook acquire a document session, run the
//! mode's operation, and release: strictly one workbook at a time, in
//! discovery order. The host automation session is a single shared resource
//! that cannot be driven from two logical operations at once, so there is no
//! parallelism anywhere in this driver.
//!
//! Failure policy is fail-fast: the first document error is logged, its
//! session is released, and the remaining documents are abandoned. Only a
//! failure to acquire the host session at all is returned as an error from
//! [`run`]; per-document errors land in the [`BatchSummary`].

use crate::host::HostGateway;
use crate::models::Settings;
use crate::services::discovery;
use crate::services::document_session::{DocumentSession, DocumentSessionError};
use crate::services::extract::{self, ExtractError};
use crate::services::host_session::{HostSession, HostSessionError};
use crate::services::writeback::{ModuleWriter, WriteBackError};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Synchronization direction for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Workbooks → text files.
    Extract,
    /// Text files → workbooks.
    WriteBack,
}

impl Mode {
    pub fn describe(&self) -> &'static str {
        match self {
            Mode::Extract => "extract",
            Mode::WriteBack => "write-back",
        }
    }
}

/// What the CLI collaborator asks a batch run to do.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: Mode,
    /// Restrict the run to workbooks with this filename.
    pub target: Option<String>,
    /// Accepted but not implemented: clearing the destination before a run
    /// has never been specified precisely enough to build.
    pub clean: bool,
}

impl RunRequest {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            target: None,
            clean: false,
        }
    }
}

/// Any error that aborts one document's processing.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Session(#[from] DocumentSessionError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    WriteBack(#[from] WriteBackError),
}

/// One successfully processed workbook.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub path: Utf8PathBuf,
    pub detail: String,
}

/// The document error that aborted a batch.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub path: Utf8PathBuf,
    pub message: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Workbooks fully processed, in order.
    pub processed: Vec<DocumentReport>,
    /// The error that stopped the batch, if any.
    pub failure: Option<BatchFailure>,
    /// Workbooks never attempted because of the failure.
    pub skipped_remaining: usize,
}

impl BatchSummary {
    pub fn aborted(&self) -> bool {
        self.failure.is_some()
    }
}

/// Run one synchronization batch.
///
/// Returns an error only when the host session itself cannot be acquired
/// (most importantly the multiple-instances precondition). Everything else
/// (including a batch aborted by a document failure) comes back as a
/// [`BatchSummary`].
pub fn run(
    request: &RunRequest,
    settings: &Settings,
    gateway: &dyn HostGateway,
) -> Result<BatchSummary, HostSessionError> {
    let mut files = discovery::find_documents(
        &settings.excel.dir,
        &settings.excel.ext,
        &settings.excel.exclude,
    );
    if let Some(target) = &request.target {
        files.retain(|p| p.file_name().is_some_and(|n| n.eq_ignore_ascii_case(target)));
    }
    if request.clean {
        tracing::warn!("The clean option is accepted but not implemented yet; ignoring it");
    }

    let mut summary = BatchSummary::default();
    if files.is_empty() {
        tracing::info!(
            "No candidate workbooks under {}; nothing to do",
            settings.excel.dir
        );
        return Ok(summary);
    }

    tracing::info!(
        "Processing {} workbook(s) in {} mode",
        files.len(),
        request.mode.describe()
    );

    let mut host = match HostSession::acquire(gateway) {
        Ok(host) => host,
        Err(e) => {
            tracing::error!("Host session acquisition failed: {e}");
            return Err(e);
        }
    };

    let writer = ModuleWriter::new();
    let total = files.len();
    for (index, path) in files.iter().enumerate() {
        match process_document(&mut host, path, request.mode, &writer, settings) {
            Ok(report) => {
                tracing::info!("{}: {}", report.path, report.detail);
                summary.processed.push(report);
            }
            Err(e) => {
                // Fail fast: a broken document aborts the rest of the batch
                tracing::error!("{}: {e}", path);
                summary.failure = Some(BatchFailure {
                    path: path.clone(),
                    message: e.to_string(),
                });
                summary.skipped_remaining = total - index - 1;
                break;
            }
        }
    }

    if let Err(e) = host.release() {
        tracing::error!("Host session release failed: {e}");
    }

    if summary.aborted() {
        tracing::error!(
            "Macro synchronization aborted ({} workbook(s) not attempted)",
            summary.skipped_remaining
        );
    } else {
        tracing::info!("Macro synchronization completed");
    }
    Ok(summary)
}

/// Process one workbook, releasing its session on every path.
fn process_document(
    host: &mut HostSession<'_>,
    path: &Utf8Path,
    mode: Mode,
    writer: &ModuleWriter,
    settings: &Settings,
) -> Result<DocumentReport, DocumentError> {
    let mut session = DocumentSession::acquire(host, path)?;

    let outcome = match mode {
        Mode::Extract => extract::extract_modules(&mut session, &settings.macros)
            .map(|s| s.summary())
            .map_err(DocumentError::from),
        Mode::WriteBack => writer
            .write_back(&mut session, &settings.macros)
            .map(|s| s.summary())
            .map_err(DocumentError::from),
    };

    // Guaranteed release before the batch moves on; the operation's error
    // takes precedence over a release error
    let released = session.release();
    let detail = outcome?;
    released?;

    Ok(DocumentReport {
        path: session.path().to_path_buf(),
        detail,
    })
}
