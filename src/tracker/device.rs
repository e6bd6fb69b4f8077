use std::fmt::Display;

use crate::radio::RadioError;
use crate::rotator::RotatorError;

pub trait HardwareError: Display {
    fn is_disconnect(&self) -> bool;
}

impl HardwareError for RotatorError {
    fn is_disconnect(&self) -> bool {
        RotatorError::is_disconnect(self)
    }
}

impl HardwareError for RadioError {
    fn is_disconnect(&self) -> bool {
        RadioError::is_disconnect(self)
    }
}

/// A piece of hardware the controller may lose mid-run. Once the link
/// reports a disconnect it stays unavailable.
pub struct Device<D: ?Sized> {
    name: &'static str,
    link: Option<Box<D>>,
}

impl<D: ?Sized> Device<D> {
    pub fn new(name: &'static str, link: Option<Box<D>>) -> Self {
        if link.is_none() {
            log::info!("Running without {}", name);
        }
        Self { name, link }
    }

    pub fn is_available(&self) -> bool {
        self.link.is_some()
    }

    /// Runs `op` against the link. Failures are logged and yield `None`.
    pub fn with<R, E: HardwareError>(
        &mut self,
        op: impl FnOnce(&mut D) -> Result<R, E>,
    ) -> Option<R> {
        let link = self.link.as_deref_mut()?;
        match op(link) {
            Ok(value) => Some(value),
            Err(e) if e.is_disconnect() => {
                log::error!("{} unavailable for the rest of the run: {}", self.name, e);
                self.link = None;
                None
            }
            Err(e) => {
                log::warn!("{} command failed: {}", self.name, e);
                None
            }
        }
    }
}
