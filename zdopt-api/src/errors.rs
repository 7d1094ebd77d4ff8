//! # Actor Error Types
//!
//! Errors produced while an actor handles messages. The runtime never
//! propagates these above the actor: they are logged at the task boundary
//! and processing continues with the next message.
//!
//! ## Usage Example
//!
//! ```rust
//! use zdopt_api::errors::ActorError;
//!
//! fn describe(error: &ActorError) -> String {
//!     match error {
//!         ActorError::Stopped => "actor is gone".to_string(),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use thiserror::Error;

/// Core error type for actor message handling.
#[derive(Error, Debug)]
pub enum ActorError {
    /// A handler failed to process a message.
    #[error("Message handling failed: {0}")]
    MessageHandlingError(String),

    /// A handler or update panicked; the panic was caught at the task boundary.
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    /// No handler is registered for the message kind.
    #[error("No handler registered for message kind {0}")]
    NoHandler(&'static str),

    /// The actor has been stopped.
    #[error("Actor stopped")]
    Stopped,

    /// Operation timeout.
    #[error("Timeout")]
    Timeout,

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
