//! Services module - The synchronization engine.
//!
//! This module contains the core logic for moving VBA modules between
//! workbooks and text files. The services are **host-agnostic**: every call
//! into the external application goes through the trait family in
//! [`crate::host`], so the whole engine runs unmodified against the platform
//! COM gateway or the in-memory simulator.
//!
//! # Components
//!
//! - [`discovery`]: Finds candidate workbooks (extension filters, exclusion
//!   set, lock-marker files).
//! - [`HostSession`]: The single shared host application instance: attach
//!   or launch, hide for the batch, restore-or-terminate on release,
//!   force-kill orphans.
//! - [`DocumentSession`]: One open workbook: bind or open, collision
//!   detection, ordered teardown.
//! - [`extract`]: Workbook modules → text files, with encoding rewrite.
//! - [`ModuleWriter`]: Text files → workbook modules; overwrite-in-place for
//!   document-bound modules, remove-and-import for the rest.
//! - [`batch`]: The sequential fail-fast driver tying it all together.
//!
//! # Design Philosophy
//!
//! - **Sequential**: One workbook at a time; the host session is a single
//!   shared resource that cannot be driven concurrently
//! - **Guaranteed release**: Sessions release on every exit path (explicit
//!   release plus `Drop` backstop); a leaked handle orphans a host process
//! - **Testable**: No hidden dependencies; the host is injected

pub mod batch;
pub mod discovery;
pub mod document_session;
pub mod extract;
pub mod host_session;
pub mod transform;
pub mod writeback;

pub use batch::{BatchFailure, BatchSummary, DocumentError, DocumentReport, Mode, RunRequest, run};
pub use discovery::find_documents;
pub use document_session::{DocumentSession, DocumentSessionError};
pub use extract::{ExtractError, ExtractSummary, extract_modules};
pub use host_session::{HostSession, HostSessionError};
pub use writeback::{ModuleWriter, WriteBackError, WriteBackSummary};
