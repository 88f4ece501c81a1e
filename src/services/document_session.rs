//! Per-workbook session lifecycle.
//!
//! A [`DocumentSession`] binds to a workbook that is already open in the
//! host or opens it fresh, and tears it down in dependency order when the
//! workbook's work is done: worksheet handles, then external references,
//! then (module handles having been dropped by the caller) the workbook
//! itself, closed only when this run opened it. Skipping the order leaks
//! host-process handles, which is what ultimately orphans background host
//! processes.

use crate::host::{DocumentHandle, HostError};
use crate::services::host_session::HostSession;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors from document session acquisition and release.
#[derive(Error, Debug)]
pub enum DocumentSessionError {
    /// The host indexes open workbooks by filename; a same-named workbook
    /// open from another path would make every lookup ambiguous, so the
    /// document is rejected instead of silently targeting the wrong one.
    #[error("a different workbook named {name} is already open from {existing}")]
    NameCollision {
        name: String,
        existing: Utf8PathBuf,
    },

    #[error("workbook path {0} has no filename")]
    InvalidPath(Utf8PathBuf),

    #[error("cannot resolve {path}: {source}")]
    Resolve {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Scoped handle to one open workbook, bound to the batch's host session.
pub struct DocumentSession {
    doc: Option<Box<dyn DocumentHandle>>,
    path: Utf8PathBuf,
    was_pre_open: bool,
}

impl DocumentSession {
    /// Bind to `path` inside the host, opening the workbook if needed.
    ///
    /// The path is made absolute first; the host's open call misbehaves on
    /// relative paths. Full-path matching against already-open workbooks is
    /// case-insensitive, the way the host itself compares them.
    pub fn acquire(
        host: &mut HostSession<'_>,
        path: &Utf8Path,
    ) -> Result<Self, DocumentSessionError> {
        let abs = absolutize(path)?;
        let file_name = abs
            .file_name()
            .ok_or_else(|| DocumentSessionError::InvalidPath(abs.clone()))?
            .to_string();

        let handle = host.handle_mut()?;
        let open = handle.open_documents()?;

        if let Some(info) = open
            .iter()
            .find(|d| d.full_path.as_str().eq_ignore_ascii_case(abs.as_str()))
        {
            tracing::debug!("Workbook {} is already open; binding to it", info.full_path);
            let doc = handle.bind_document(&info.name)?;
            return Ok(Self {
                doc: Some(doc),
                path: abs,
                was_pre_open: true,
            });
        }

        if let Some(info) = open
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(&file_name))
        {
            return Err(DocumentSessionError::NameCollision {
                name: file_name,
                existing: info.full_path.clone(),
            });
        }

        tracing::debug!("Opening workbook {}", abs);
        let doc = handle.open_document(&abs)?;
        Ok(Self {
            doc: Some(doc),
            path: abs,
            was_pre_open: false,
        })
    }

    /// Absolute path of the workbook this session is bound to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn was_pre_open(&self) -> bool {
        self.was_pre_open
    }

    pub fn document(&self) -> Result<&dyn DocumentHandle, HostError> {
        self.doc.as_deref().ok_or(HostError::Released)
    }

    pub fn document_mut(&mut self) -> Result<&mut (dyn DocumentHandle + 'static), HostError> {
        self.doc.as_deref_mut().ok_or(HostError::Released)
    }

    /// Save the workbook. The module writer calls this before release;
    /// extraction never does.
    pub fn save(&mut self) -> Result<(), HostError> {
        self.document_mut()?.save()
    }

    /// Ordered teardown of the workbook's sub-resources, then the workbook.
    ///
    /// Closes without saving; pending changes a caller wants kept must go
    /// through [`save`](Self::save) first. A workbook the user already had
    /// open is left open. Calling release twice is a no-op.
    pub fn release(&mut self) -> Result<(), DocumentSessionError> {
        let Some(mut doc) = self.doc.take() else {
            return Ok(());
        };

        let sheets = doc.release_worksheets()?;
        let refs = doc.release_external_references()?;
        tracing::debug!(
            "Released {} worksheet handle(s) and {} external reference(s) of {}",
            sheets,
            refs,
            self.path
        );

        if !self.was_pre_open {
            doc.close(false)?;
            tracing::debug!("Closed workbook {}", self.path);
        }
        drop(doc);
        Ok(())
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        if self.doc.is_some() {
            if let Err(e) = self.release() {
                tracing::error!("Document session release failed during drop: {e}");
            }
        }
    }
}

/// Absolute form of `path` without touching the filesystem beyond the
/// working directory (the workbook may be closed, but it may also not exist
/// yet from this process's point of view).
fn absolutize(path: &Utf8Path) -> Result<Utf8PathBuf, DocumentSessionError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let abs = std::path::absolute(path).map_err(|source| DocumentSessionError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;
    Utf8PathBuf::from_path_buf(abs)
        .map_err(|_| DocumentSessionError::InvalidPath(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::{SimGateway, SimModule};
    use tempfile::TempDir;

    fn path_in(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().join(name)).unwrap()
    }

    fn sim_with_book(dir: &TempDir, name: &str) -> (SimGateway, Utf8PathBuf) {
        let sim = SimGateway::new();
        let book = path_in(dir, name);
        sim.add_workbook(&book, vec![SimModule::standard("Util", "Sub A()\r\nEnd Sub")]);
        (sim, book)
    }

    #[test]
    fn test_acquire_opens_closed_workbook() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");

        let mut host = HostSession::acquire(&sim).unwrap();
        let session = DocumentSession::acquire(&mut host, &book).unwrap();

        assert!(!session.was_pre_open());
        assert!(sim.is_open(&book));
    }

    #[test]
    fn test_acquire_binds_to_pre_open_workbook() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");
        sim.open_workbook(&book);
        sim.set_running(true);

        let mut host = HostSession::acquire(&sim).unwrap();
        let session = DocumentSession::acquire(&mut host, &book).unwrap();
        assert!(session.was_pre_open());
    }

    #[test]
    fn test_pre_open_path_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");
        sim.open_workbook(&book);
        sim.set_running(true);

        let shouted = Utf8PathBuf::from(book.as_str().to_ascii_uppercase());
        let mut host = HostSession::acquire(&sim).unwrap();
        let session = DocumentSession::acquire(&mut host, &shouted).unwrap();
        assert!(session.was_pre_open());
    }

    #[test]
    fn test_same_name_under_other_path_is_a_collision() {
        let dir = TempDir::new().unwrap();
        let sim = SimGateway::new();
        let first = path_in(&dir, "a/Book1.xlsm");
        let second = path_in(&dir, "b/Book1.xlsm");
        sim.add_workbook(&first, vec![]);
        sim.add_workbook(&second, vec![]);
        sim.open_workbook(&first);
        sim.set_running(true);

        let mut host = HostSession::acquire(&sim).unwrap();
        let result = DocumentSession::acquire(&mut host, &second);

        assert!(matches!(
            result,
            Err(DocumentSessionError::NameCollision { .. })
        ));
        // The collision must not have opened a second workbook
        assert!(!sim.is_open(&second));
    }

    #[test]
    fn test_release_closes_workbook_opened_by_us() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");

        let mut host = HostSession::acquire(&sim).unwrap();
        let mut session = DocumentSession::acquire(&mut host, &book).unwrap();
        session.release().unwrap();

        assert!(!sim.is_open(&book));
        assert!(sim.worksheets_released(&book));
        assert!(sim.references_released(&book));
    }

    #[test]
    fn test_release_leaves_pre_open_workbook_open() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");
        sim.open_workbook(&book);
        sim.set_running(true);

        let mut host = HostSession::acquire(&sim).unwrap();
        let mut session = DocumentSession::acquire(&mut host, &book).unwrap();
        session.release().unwrap();

        assert!(sim.is_open(&book));
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");

        let mut host = HostSession::acquire(&sim).unwrap();
        let mut session = DocumentSession::acquire(&mut host, &book).unwrap();
        session.release().unwrap();
        session.release().unwrap();
        assert!(session.document().is_err());
    }

    #[test]
    fn test_drop_closes_workbook() {
        let dir = TempDir::new().unwrap();
        let (sim, book) = sim_with_book(&dir, "Book1.xlsm");

        let mut host = HostSession::acquire(&sim).unwrap();
        {
            let _session = DocumentSession::acquire(&mut host, &book).unwrap();
            assert!(sim.is_open(&book));
        }
        assert!(!sim.is_open(&book));
    }
}
