//! Maps RUNNING/EXIT reports to process state transitions.
//! A report only applies when it matches the session's request id or pid;
//! everything else belongs to a superseded run and is skipped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Starting,
    Running,
    Exited,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Starting => "STARTING",
            ProcessState::Running => "RUNNING",
            ProcessState::Exited => "EXITED",
        }
    }

    /// Human-facing status text.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessState::Starting => "Starting...",
            ProcessState::Running => "Running",
            ProcessState::Exited => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// RUNNING for a request id other than the current one.
    StaleRequest,
    /// EXIT for a pid other than the bound one.
    StalePid,
    /// EXIT before any RUNNING bound a pid.
    PidUnbound,
    AlreadyRunning,
    AlreadyExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleUpdate {
    Advanced {
        from: ProcessState,
        to: ProcessState,
    },
    Skip(SkipReason),
}

impl LifecycleUpdate {
    pub fn is_advanced(&self) -> bool {
        matches!(self, LifecycleUpdate::Advanced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    request_id: String,
    pid: Option<u32>,
    state: ProcessState,
}

impl Lifecycle {
    pub fn start(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            pid: None,
            state: ProcessState::Starting,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// The pid of a process that may still be alive and needs a KILL to stop.
    pub fn live_pid(&self) -> Option<u32> {
        if self.state == ProcessState::Exited {
            return None;
        }
        self.pid
    }

    pub fn on_running(&mut self, request_id: &str, pid: u32) -> LifecycleUpdate {
        if request_id != self.request_id {
            return LifecycleUpdate::Skip(SkipReason::StaleRequest);
        }
        match self.state {
            ProcessState::Starting => {
                self.pid = Some(pid);
                self.advance(ProcessState::Running)
            }
            ProcessState::Running => LifecycleUpdate::Skip(SkipReason::AlreadyRunning),
            ProcessState::Exited => LifecycleUpdate::Skip(SkipReason::AlreadyExited),
        }
    }

    pub fn on_exit(&mut self, pid: u32) -> LifecycleUpdate {
        match self.pid {
            None => return LifecycleUpdate::Skip(SkipReason::PidUnbound),
            Some(bound) if bound != pid => return LifecycleUpdate::Skip(SkipReason::StalePid),
            Some(_) => {}
        }
        match self.state {
            ProcessState::Running => self.advance(ProcessState::Exited),
            ProcessState::Exited => LifecycleUpdate::Skip(SkipReason::AlreadyExited),
            // A bound pid implies RUNNING was observed.
            ProcessState::Starting => LifecycleUpdate::Skip(SkipReason::PidUnbound),
        }
    }

    fn advance(&mut self, to: ProcessState) -> LifecycleUpdate {
        debug_assert!(to > self.state, "process state must only move forward");
        let from = self.state;
        self.state = to;
        LifecycleUpdate::Advanced { from, to }
    }
}
