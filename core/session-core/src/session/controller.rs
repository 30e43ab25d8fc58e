//! Session controller: the single writer for lifecycle, transcript and prompts.
//!
//! Inbound protocol messages and user actions both land here. Each call runs
//! to completion under `&mut self` and emits at most a couple of outbound
//! messages, so no reader can observe a half-applied event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use trailhead_protocol::{InboundMessage, OutboundMessage, StdioData};
use ulid::Ulid;

use crate::config::SessionConfig;
use crate::error::{ConsistencyError, Result, SessionError};
use crate::session::lifecycle::{Lifecycle, LifecycleUpdate, ProcessState};
use crate::session::module_path::{module_from_path, ProcessTarget};
use crate::session::prompt::{self, PromptRef};
use crate::session::transcript::{StdioEvent, StdioKind, Transcript, TranscriptEntry};
use crate::session::transport::Transport;

/// One process run.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    generation: u64,
    target: ProcessTarget,
    lifecycle: Lifecycle,
    transcript: Transcript,
    inspect_requested: bool,
}

impl Session {
    fn new(generation: u64, target: ProcessTarget, request_id: String) -> Self {
        Self {
            generation,
            target,
            lifecycle: Lifecycle::start(request_id),
            transcript: Transcript::new(),
            inspect_requested: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> &ProcessTarget {
        &self.target
    }

    pub fn request_id(&self) -> &str {
        self.lifecycle.request_id()
    }

    pub fn pid(&self) -> Option<u32> {
        self.lifecycle.pid()
    }

    pub fn state(&self) -> ProcessState {
        self.lifecycle.state()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

/// Serializable view handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub module: String,
    pub path: String,
    pub request_id: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub status: &'static str,
    pub pending_prompt: Option<PromptRef>,
    pub transcript: Vec<TranscriptEntry>,
}

pub struct SessionController<T: Transport> {
    transport: T,
    config: SessionConfig,
    generation: u64,
    session: Option<Session>,
    input: String,
    torn_down: bool,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            generation: 0,
            session: None,
            input: String::new(),
            torn_down: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read surface
    // ─────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> Option<ProcessState> {
        self.session.as_ref().map(Session::state)
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        match &self.session {
            Some(session) => session.transcript.entries(),
            None => &[],
        }
    }

    /// "Run again" is offered once the current process has completed.
    pub fn can_run_again(&self) -> bool {
        self.state() == Some(ProcessState::Exited)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn pending_prompt(&self) -> Option<PromptRef> {
        let session = self.session.as_ref()?;
        prompt::pending_prompt(&session.transcript, session.generation)
    }

    pub fn prompt_ref(&self, index: usize) -> Result<PromptRef> {
        let session = self.session.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(prompt::prompt_ref(
            &session.transcript,
            session.generation,
            index,
        )?)
    }

    pub fn target_for_path(&self, path: &str) -> ProcessTarget {
        ProcessTarget::from_path(path, &self.config)
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let session = self.session.as_ref()?;
        let state = session.state();
        Some(SessionSnapshot {
            generation: session.generation,
            module: session.target.module.clone(),
            path: session.target.path.clone(),
            request_id: session.request_id().to_string(),
            pid: session.pid(),
            state,
            status: state.label(),
            pending_prompt: self.pending_prompt(),
            transcript: session.transcript.entries().to_vec(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // User actions
    // ─────────────────────────────────────────────────────────────────────

    /// Starts a new generation for `target` and returns its number.
    ///
    /// The previous session is replaced wholesale; its late messages fail the
    /// request id / pid checks from here on.
    pub fn run(&mut self, target: ProcessTarget) -> u64 {
        self.generation += 1;
        let request_id = Ulid::new().to_string();
        let message = OutboundMessage::Run {
            module: target.module.clone(),
            request_id: request_id.clone(),
        };

        info!(
            generation = self.generation,
            module = %target.module,
            request_id = %request_id,
            "Starting process run"
        );

        self.session = Some(Session::new(self.generation, target, request_id));
        self.input.clear();
        self.torn_down = false;
        self.transport.send(message);
        self.generation
    }

    pub fn run_again(&mut self) -> Result<u64> {
        let target = self
            .session
            .as_ref()
            .map(|session| session.target.clone())
            .ok_or(SessionError::NoActiveSession)?;
        Ok(self.run(target))
    }

    /// Answers the prompt captured in `captured` and sends the answer to the
    /// process.
    pub fn resolve(&mut self, captured: &PromptRef, value: impl Into<String>) -> Result<()> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let pid = session.pid().ok_or(ConsistencyError::NoProcess {
            generation: session.generation,
        })?;
        let value = value.into();

        prompt::resolve(
            &mut session.transcript,
            session.generation,
            captured,
            value.clone(),
        )?;

        debug!(
            generation = session.generation,
            index = captured.index,
            pid,
            "Stdin prompt resolved"
        );
        self.input.clear();
        self.transport.send(OutboundMessage::Stdin { data: value, pid });
        Ok(())
    }

    /// Resolves the pending prompt with the input buffer.
    pub fn submit_input(&mut self) -> Result<()> {
        let captured = self
            .pending_prompt()
            .ok_or(ConsistencyError::NoPendingPrompt)?;
        let value = self.input.clone();
        self.resolve(&captured, value)
    }

    /// Stops observing: kills a process that may still be alive.
    ///
    /// Idempotent, and also invoked on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let Some(session) = self.session.as_ref() else {
            return;
        };
        if let Some(pid) = session.lifecycle.live_pid() {
            info!(generation = session.generation, pid, "Killing process on teardown");
            self.transport.send(OutboundMessage::Kill { pid });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inbound protocol messages
    // ─────────────────────────────────────────────────────────────────────

    pub fn handle(&mut self, message: InboundMessage) {
        self.handle_at(message, Utc::now());
    }

    pub fn handle_at(&mut self, message: InboundMessage, now: DateTime<Utc>) {
        match message {
            InboundMessage::Running(data) => self.on_running(&data.request_id, data.pid),
            InboundMessage::Stdout(data) => self.on_stdio(StdioKind::Stdout, data, now),
            InboundMessage::Stderr(data) => self.on_stdio(StdioKind::Stderr, data, now),
            InboundMessage::Exit(data) => self.on_exit(data.pid),
            InboundMessage::FileModified(data) => self.on_file_modified(&data.path),
            InboundMessage::Inspect(result) => {
                debug!(result = %result, "Inspector result received");
            }
        }
    }

    pub fn on_running(&mut self, request_id: &str, pid: u32) {
        let Some(session) = self.session.as_mut() else {
            debug!(request_id, pid, "RUNNING before any run; ignoring");
            return;
        };

        match session.lifecycle.on_running(request_id, pid) {
            LifecycleUpdate::Advanced { .. } => {
                info!(generation = session.generation, pid, "Process running");
                if self.torn_down {
                    // Started after observation stopped; nobody will kill it later.
                    info!(generation = session.generation, pid, "Killing process started after teardown");
                    self.transport.send(OutboundMessage::Kill { pid });
                }
            }
            LifecycleUpdate::Skip(reason) => {
                debug!(
                    generation = session.generation,
                    request_id,
                    pid,
                    reason = ?reason,
                    "Skipping RUNNING"
                );
            }
        }
    }

    pub fn on_exit(&mut self, pid: u32) {
        let Some(session) = self.session.as_mut() else {
            debug!(pid, "EXIT before any run; ignoring");
            return;
        };

        match session.lifecycle.on_exit(pid) {
            LifecycleUpdate::Advanced { .. } => {
                info!(generation = session.generation, pid, "Process exited");
                if self.torn_down {
                    debug!(generation = session.generation, "Torn down; skipping INSPECT");
                } else if !session.inspect_requested {
                    session.inspect_requested = true;
                    self.transport.send(OutboundMessage::Inspect {
                        path: session.target.path.clone(),
                    });
                }
            }
            LifecycleUpdate::Skip(reason) => {
                debug!(
                    generation = session.generation,
                    pid,
                    reason = ?reason,
                    "Skipping EXIT"
                );
            }
        }
    }

    /// Restarts the session when the edited file is the module it runs.
    ///
    /// Ignored after teardown: a dismissed session never starts a process.
    pub fn on_file_modified(&mut self, path: &str) {
        let module = module_from_path(path, &self.config);
        if self.torn_down {
            debug!(path, module = %module, "File modified after teardown; ignoring");
            return;
        }
        let Some(session) = self.session.as_ref() else {
            debug!(path, module = %module, "File modified with no session; ignoring");
            return;
        };
        if session.target.module != module {
            debug!(path, module = %module, "File modified for another module; ignoring");
            return;
        }

        let target = session.target.clone();
        if let Some(pid) = session.lifecycle.live_pid() {
            info!(generation = session.generation, pid, module = %module, "Killing process for rerun");
            self.transport.send(OutboundMessage::Kill { pid });
        }
        self.run(target);
    }

    fn on_stdio(&mut self, kind: StdioKind, data: StdioData, now: DateTime<Utc>) {
        let Some(session) = self.session.as_mut() else {
            debug!(kind = ?kind, "Output before any run; ignoring");
            return;
        };

        // Output is only attributable while the bound process runs.
        if session.state() != ProcessState::Running {
            debug!(
                generation = session.generation,
                state = session.state().as_str(),
                kind = ?kind,
                "Skipping output outside RUNNING"
            );
            return;
        }
        if data.pid.is_some() && data.pid != session.pid() {
            debug!(
                generation = session.generation,
                pid = ?data.pid,
                "Skipping output from another process"
            );
            return;
        }

        let event = if data.is_input_prompt {
            if session.transcript.pending_prompt_index().is_some() {
                warn!(
                    generation = session.generation,
                    "New stdin prompt while another is unresolved"
                );
            }
            StdioEvent::prompt(kind, data.data)
        } else {
            StdioEvent {
                kind,
                text: data.data,
                is_prompt: false,
            }
        };
        session.transcript.ingest(event, now);
    }
}

impl<T: Transport> Drop for SessionController<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
