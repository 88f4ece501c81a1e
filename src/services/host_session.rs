//! Host application session lifecycle.
//!
//! One [`HostSession`] exists per batch run. It attaches to the instance the
//! user already has running (leaving that session intact on release) or
//! launches a fresh one (terminated on release, including a force-kill pass
//! for the orphaned background process the host is known to leave behind).
//! Release is idempotent and also runs from `Drop`, so the instance is never
//! leaked on an error path.

use crate::host::{HostError, HostGateway, HostHandle};
use thiserror::Error;

/// Errors from host session acquisition and release.
#[derive(Error, Debug)]
pub enum HostSessionError {
    /// More than one host process is running; the automation lookup cannot
    /// target a specific one, so this aborts before any document work.
    #[error("{0} host instances are running; close all but one and retry")]
    MultipleInstances(usize),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Scoped handle to the single shared host application instance.
pub struct HostSession<'g> {
    gateway: &'g dyn HostGateway,
    handle: Option<Box<dyn HostHandle>>,
    was_pre_running: bool,
    was_pre_visible: bool,
}

impl<'g> HostSession<'g> {
    /// Attach to the running host instance or launch a new one.
    ///
    /// Checks the single-instance precondition first, records whether the
    /// instance pre-existed and whether it was visible, then hides it for
    /// the duration of batch processing.
    pub fn acquire(gateway: &'g dyn HostGateway) -> Result<Self, HostSessionError> {
        let running = gateway.running_instances()?;
        if running > 1 {
            return Err(HostSessionError::MultipleInstances(running));
        }

        let (handle, was_pre_running) = match gateway.attach()? {
            Some(handle) => {
                tracing::debug!("Attached to the running host instance");
                (handle, true)
            }
            None => {
                tracing::debug!("No running host instance; launching a new one");
                (gateway.launch()?, false)
            }
        };

        // From here on the Drop backstop releases the instance on failure
        let mut session = Self {
            gateway,
            handle: Some(handle),
            was_pre_running,
            was_pre_visible: true,
        };

        let visible = match session.handle.as_ref() {
            Some(handle) => handle.is_visible()?,
            None => false,
        };
        session.was_pre_visible = visible;
        if let Some(handle) = session.handle.as_mut() {
            handle.set_visible(false)?;
        }

        tracing::info!(
            "Host session acquired (pre-running: {}, previously visible: {})",
            was_pre_running,
            visible
        );
        Ok(session)
    }

    pub fn was_pre_running(&self) -> bool {
        self.was_pre_running
    }

    /// The live application handle, for opening and enumerating workbooks.
    pub fn handle_mut(&mut self) -> Result<&mut (dyn HostHandle + 'static), HostError> {
        self.handle.as_deref_mut().ok_or(HostError::Released)
    }

    /// Release the instance.
    ///
    /// A pre-existing instance gets its recorded visibility back and keeps
    /// running for the user. A freshly launched one is asked to quit, after
    /// which any host process still alive is force-killed. Calling release
    /// twice is a no-op.
    pub fn release(&mut self) -> Result<(), HostSessionError> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };

        if self.was_pre_running {
            handle.set_visible(self.was_pre_visible)?;
            drop(handle);
            tracing::info!("Restored host visibility; the user's instance keeps running");
        } else {
            handle.quit()?;
            drop(handle);
            let strays = self.gateway.kill_stray_instances()?;
            if strays > 0 {
                tracing::warn!(
                    "Force-killed {} host process(es) still alive after quit",
                    strays
                );
            }
            tracing::info!("Terminated the host instance launched for this run");
        }
        Ok(())
    }
}

impl Drop for HostSession<'_> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.release() {
                tracing::error!("Host session release failed during drop: {e}");
            }
        }
    }
}
