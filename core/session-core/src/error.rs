//! Error types for trailhead-core operations.
//!
//! Stale protocol messages are not errors; they are filtered by the session
//! controller and never surface here.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Consistency Errors (state desync between the caller and the transcript)
// ═══════════════════════════════════════════════════════════════════════════════

/// A caller acted on a view of the transcript that no longer holds.
///
/// These are programmer or state-desync bugs. They fail the operation and
/// leave the transcript untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("Prompt reference from generation {captured} is stale (current generation {current})")]
    StaleGeneration { captured: u64, current: u64 },

    #[error("Transcript index {index} is out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Transcript entry {index} is not a stdin prompt (found {found})")]
    NotAPrompt { index: usize, found: &'static str },

    #[error("Transcript entry {index} no longer matches the captured prompt")]
    StaleIndex { index: usize },

    #[error("Stdin prompt {index} is already resolved")]
    AlreadyResolved { index: usize },

    #[error("Stdin prompt {index} is not the current prompt (current: {current:?})")]
    NotCurrentPrompt {
        index: usize,
        current: Option<usize>,
    },

    #[error("No process is bound to generation {generation}")]
    NoProcess { generation: u64 },

    #[error("No unresolved stdin prompt to submit input to")]
    NoPendingPrompt,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Error (crate-wide)
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in trailhead-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("No session has been started")]
    NoActiveSession,

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file unreadable: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// True for errors caused by acting on an outdated view of the session.
    pub fn is_consistency(&self) -> bool {
        matches!(self, SessionError::Consistency(_))
    }
}
