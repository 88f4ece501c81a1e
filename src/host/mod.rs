//! Host automation abstraction.
//!
//! Everything the synchronization engine needs from the external host
//! application (Excel) is expressed through the trait family in this module:
//!
//! - [`HostGateway`]: process-level primitives for counting running host
//!   instances, attaching to one via the platform's "get active object"
//!   lookup, launching a fresh one, and force-killing strays. The engine
//!   treats these as opaque; it only distinguishes found vs. not-found.
//! - [`HostHandle`]: one application instance (visibility, open workbooks,
//!   quit).
//! - [`DocumentHandle`]: one open workbook (module collection, save/close,
//!   sub-resource release).
//! - [`ModuleHandle`]: one VBA component inside a workbook's script project.
//!
//! The platform COM bridge implements these traits in the embedding binary.
//! This crate ships [`sim`], a complete in-memory host used by the test
//! suite and by the session managers' unit tests.
//!
//! Handle types map the host's reference-counted automation objects onto
//! Rust ownership: dropping a handle releases the underlying object, and the
//! session managers drop handles in dependency order (modules before the
//! document, documents before the application).

pub mod sim;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Class identifier used by the platform lookup to find a running instance.
pub const HOST_PROG_ID: &str = "Excel.Application";

/// Filename prefix of the host's transient lock-marker files.
///
/// A workbook `Book1.xlsm` that is open in the host leaves a `~$Book1.xlsm`
/// companion next to it; discovery must never treat those as documents.
pub const LOCK_FILE_PREFIX: &str = "~$";

/// Errors surfaced by host automation calls.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("host automation call failed: {0}")]
    Call(String),

    #[error("module {0} not found in the script project")]
    ModuleNotFound(String),

    #[error("document {0} is not open in the host")]
    DocumentNotOpen(String),

    #[error("automation handle already released")]
    Released,

    #[error("I/O error during host file exchange: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of a VBA component inside a workbook's script project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Free-standing standard module (`.bas`).
    Standard,
    /// Free-standing class module (`.cls`).
    ClassBased,
    /// Module bound to a sheet or to the workbook itself; cannot be removed
    /// and re-created, only overwritten in place.
    DocumentBound,
    /// UserForm module; has no portable text representation.
    FormBound,
}

impl ModuleKind {
    /// File extension used when exporting a module of this kind.
    pub fn file_extension(&self) -> &'static str {
        match self {
            ModuleKind::Standard => "bas",
            ModuleKind::ClassBased | ModuleKind::DocumentBound => "cls",
            ModuleKind::FormBound => "frm",
        }
    }

    /// Component kind the host assigns to an imported file, by extension.
    ///
    /// Importing can never produce a document-bound module; those exist only
    /// as part of the workbook structure itself.
    pub fn from_extension(ext: &str) -> ModuleKind {
        match ext.to_ascii_lowercase().as_str() {
            "cls" => ModuleKind::ClassBased,
            "frm" => ModuleKind::FormBound,
            _ => ModuleKind::Standard,
        }
    }
}

/// Name and resolved path of a workbook currently open in the host.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    /// Filename the host indexes the workbook by (e.g. `Book1.xlsm`).
    pub name: String,
    /// Full path the workbook was opened from.
    pub full_path: Utf8PathBuf,
}

/// Process-level host primitives.
///
/// `attach` wraps the platform's "find running instance by class identifier"
/// call; the engine only cares about found vs. not-found. `launch` starts a
/// new instance. `kill_stray_instances` force-kills every process of the
/// host's kind and reports how many it found; the host is known to leave an
/// orphaned background process behind after a scripted quit.
#[cfg_attr(test, mockall::automock)]
pub trait HostGateway {
    /// Number of host processes currently running system-wide.
    fn running_instances(&self) -> Result<usize, HostError>;

    /// Attach to an already-running instance, if one exists. Platform
    /// gateways look the instance up under [`HOST_PROG_ID`].
    fn attach(&self) -> Result<Option<Box<dyn HostHandle>>, HostError>;

    /// Start a new host instance.
    fn launch(&self) -> Result<Box<dyn HostHandle>, HostError>;

    /// Force-kill every remaining host process; returns how many were found.
    fn kill_stray_instances(&self) -> Result<usize, HostError>;
}

/// One running host application instance.
pub trait HostHandle {
    fn is_visible(&self) -> Result<bool, HostError>;

    fn set_visible(&mut self, visible: bool) -> Result<(), HostError>;

    /// Workbooks currently open in this instance, in the host's own order.
    fn open_documents(&self) -> Result<Vec<DocumentInfo>, HostError>;

    /// Bind to an already-open workbook by the filename the host indexes it
    /// under.
    fn bind_document(&self, name: &str) -> Result<Box<dyn DocumentHandle>, HostError>;

    /// Open the workbook at `path`. The path must be absolute; the host's
    /// open call misbehaves on relative paths.
    fn open_document(&mut self, path: &Utf8Path) -> Result<Box<dyn DocumentHandle>, HostError>;

    /// Ask the instance to terminate.
    fn quit(&mut self) -> Result<(), HostError>;
}

/// One open workbook.
pub trait DocumentHandle {
    /// Filename the host indexes the workbook by.
    fn name(&self) -> Result<String, HostError>;

    /// Full path the workbook was opened from.
    fn full_path(&self) -> Result<Utf8PathBuf, HostError>;

    /// Release all worksheet handles; returns how many were held.
    fn release_worksheets(&mut self) -> Result<usize, HostError>;

    /// Release the script project's non-built-in external references;
    /// returns how many were held.
    fn release_external_references(&mut self) -> Result<usize, HostError>;

    /// Handles to every module in the script project, in collection order.
    fn modules(&self) -> Result<Vec<Box<dyn ModuleHandle>>, HostError>;

    /// Look up a single module by its declared name.
    fn find_module(&self, name: &str) -> Result<Option<Box<dyn ModuleHandle>>, HostError>;

    /// Remove a free-standing module from the script project.
    ///
    /// Fails with [`HostError::ModuleNotFound`] when no module of that name
    /// exists.
    fn remove_module(&mut self, name: &str) -> Result<(), HostError>;

    /// Import a module file into the script project. The host reads the file
    /// in its native encoding and derives the component kind from the file
    /// extension.
    fn import_module(&mut self, path: &Utf8Path) -> Result<(), HostError>;

    fn save(&mut self) -> Result<(), HostError>;

    /// Close the workbook. `save_changes = false` discards pending edits.
    fn close(&mut self, save_changes: bool) -> Result<(), HostError>;
}

/// One VBA component inside a workbook's script project.
pub trait ModuleHandle {
    fn name(&self) -> Result<String, HostError>;

    fn kind(&self) -> Result<ModuleKind, HostError>;

    /// Number of lines in the module's code body.
    fn line_count(&self) -> Result<usize, HostError>;

    /// The module's full code body.
    fn source_text(&self) -> Result<String, HostError>;

    /// For document-bound modules, the name of the sheet or workbook the
    /// module is attached to. `None` for free-standing modules.
    fn bound_object_name(&self) -> Result<Option<String>, HostError>;

    /// Export the module to `path` via the host's native export call.
    /// The host always writes in its native legacy encoding.
    fn export(&self, path: &Utf8Path) -> Result<(), HostError>;

    /// Replace the module's entire code body in place.
    fn replace_body(&mut self, body: &str) -> Result<(), HostError>;
}
