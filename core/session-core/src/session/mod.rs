//! Process Session Engine
//!
//! Tracks one remote process run at a time and folds its output into an
//! ordered transcript.
//!
//! # Architecture: Single Writer
//!
//! ```text
//! process host ─ inbound ─┐                         ┌─ outbound ─→ process host
//!                         ├→ SessionController ─────┤
//! user actions ───────────┘    (sole writer)        └─ snapshot ─→ renderer
//!                              │        │       │
//!                         lifecycle transcript prompt
//! ```
//!
//! # Generations
//!
//! Every run starts a new generation with a fresh request id. Messages from a
//! superseded run are not cancelled at the source; they fail the request id /
//! pid match and are dropped when consumed.
//!
//! # Module Structure
//!
//! - [`controller`]: run/kill/rerun/inspect policy and message dispatch
//! - [`lifecycle`]: STARTING → RUNNING → EXITED transitions
//! - [`transcript`]: stdout grouping and transcript entries
//! - [`prompt`]: stdin prompt resolution
//! - [`module_path`]: module identifiers from source paths
//! - [`transport`]: outbound message sink

pub mod controller;
pub mod lifecycle;
pub mod module_path;
pub mod prompt;
pub mod transcript;
pub mod transport;

pub use controller::{Session, SessionController, SessionSnapshot};
pub use lifecycle::{Lifecycle, LifecycleUpdate, ProcessState, SkipReason};
pub use module_path::{module_from_path, ProcessTarget};
pub use prompt::PromptRef;
pub use transcript::{
    StdinPrompt, StdioEvent, StdioKind, StdoutGroup, Transcript, TranscriptEntry,
};
pub use transport::Transport;
