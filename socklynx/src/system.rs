//! Process-wide initialization of the OS networking subsystem.
//!
//! Winsock must be started before the first socket call and should be stopped at exit. POSIX
//! needs neither, so both calls are no-op successes there. Repeated calls are idempotent.

use core::fmt::{self, Display, Formatter};
use std::sync::{Mutex, PoisonError};

use crate::Result;
use crate::sys::{NativeApi, Platform};

/// Whether the OS networking subsystem is initialized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Not initialized.
    #[default]
    Stopped,
    /// Initialized by [`setup`].
    Started,
}

impl Display for SystemState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SystemState::Stopped => f.write_str("stopped"),
            SystemState::Started => f.write_str("started"),
        }
    }
}

static STATE: Mutex<SystemState> = Mutex::new(SystemState::Stopped);

/// Initializes the OS networking subsystem.
///
/// Returns immediately if it is already started.
pub fn setup() -> Result<()> {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    if *state == SystemState::Started {
        return Ok(());
    }
    Platform::startup()?;
    *state = SystemState::Started;
    tracing::debug!("network subsystem started");
    Ok(())
}

/// Tears the OS networking subsystem down.
///
/// Returns immediately if it is already stopped. Sockets still open keep their handles but
/// are unusable on platforms that need the subsystem.
pub fn cleanup() -> Result<()> {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    if *state == SystemState::Stopped {
        return Ok(());
    }
    Platform::teardown()?;
    *state = SystemState::Stopped;
    tracing::debug!("network subsystem stopped");
    Ok(())
}

/// The current state of the OS networking subsystem.
pub fn system_state() -> SystemState {
    *STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::SystemState;

    #[test]
    fn state_names() {
        assert_eq!(SystemState::Started.to_string(), "started");
        assert_eq!(SystemState::default().to_string(), "stopped");
    }
}
