//! Worker lifecycle states and transitions.

use serde::Serialize;
use std::fmt;
use taximoto_core::Error;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, no install attempted yet.
    Parsed,
    /// First install in progress.
    Installing,
    /// Cache populated; waiting for activation.
    Installed,
    /// Intercepting fetches.
    Activated,
    /// First install failed; a later install may retry.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine guarding install and activation.
///
/// An activated worker keeps serving while a reinstall runs, and keeps
/// serving if that reinstall fails.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: WorkerState,
    install_in_flight: bool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self { state: WorkerState::Parsed, install_in_flight: false }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    pub(crate) fn begin_install(&mut self) -> Result<(), Error> {
        if self.install_in_flight {
            return Err(Error::InvalidState("install already in progress".into()));
        }
        self.install_in_flight = true;
        if self.state != WorkerState::Activated {
            self.state = WorkerState::Installing;
        }
        Ok(())
    }

    pub(crate) fn finish_install(&mut self, succeeded: bool) {
        self.install_in_flight = false;
        if self.state == WorkerState::Activated {
            return;
        }
        self.state = if succeeded { WorkerState::Installed } else { WorkerState::Redundant };
    }

    /// Returns false when the worker was already active.
    pub(crate) fn activate(&mut self) -> Result<bool, Error> {
        match self.state {
            WorkerState::Installed => {
                self.state = WorkerState::Activated;
                Ok(true)
            }
            WorkerState::Activated => Ok(false),
            other => Err(Error::InvalidState(format!("cannot activate a worker that is {other}"))),
        }
    }
}
