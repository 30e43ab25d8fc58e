//! # trailhead-core
//!
//! Process session engine for Trailhead: observes a remote process as an
//! ordered transcript of stdout bursts, stderr lines and stdin prompts, and
//! decides when to run, kill, rerun and inspect it.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Transports wrap it as needed.
//! - **Single writer**: `SessionController` owns all mutable session state.
//! - **Stale messages are data, not errors**: they are matched and dropped.
//! - **Consistency errors are loud**: a desynced caller gets an error, never a guess.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trailhead_core::{SessionConfig, SessionController};
//!
//! let mut controller = SessionController::new(Vec::new(), SessionConfig::default());
//! let target = controller.target_for_path("./hello.py");
//! controller.run(target);
//! controller.handle(message);
//! let transcript = controller.transcript();
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::{default_config_path, load_session_config, DisplayThresholds, SessionConfig};
pub use error::{ConsistencyError, Result, SessionError};
pub use session::*;

pub use trailhead_protocol as protocol;
