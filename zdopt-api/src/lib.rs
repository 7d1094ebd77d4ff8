//! # zdopt Actor Runtime API
//!
//! Capability traits shared by the zdopt runtime and the code built on it.
//! The runtime crate (`zdopt`) provides the implementations; this crate only
//! states what a participant must be able to do.
//!
//! ## Core Components
//!
//! - **Actors**: independently scheduled units ticked by a group and fed by a mailbox
//! - **Messages**: payloads tagged with an explicit, enumerated kind
//! - **Poolable**: the `{on_get, on_release}` capability required of pooled values
//! - **Session**: the read side of an opaque transport session
//!
//! ## Usage Example
//!
//! ```rust
//! use zdopt_api::{Message, MessageKind};
//!
//! #[derive(Message)]
//! enum PlayerMsg {
//!     Login(String),
//!     Move { x: f32, y: f32 },
//!     Logout,
//! }
//!
//! let msg = PlayerMsg::Move { x: 1.0, y: 2.0 };
//! assert_eq!(msg.kind(), PlayerMsgKind::Move);
//! assert_eq!(msg.kind().name(), "Move");
//! ```
//!
//! ## Module Organization
//!
//! - [`actor`]: actor trait, identity and lifecycle state
//! - [`message`]: message and message-kind traits
//! - [`pool`]: pooled value capability
//! - [`session`]: transport session capability
//! - [`errors`]: error types shared across the runtime
//! - [`types`]: common type aliases

pub mod actor;
pub mod errors;
pub mod message;
pub mod pool;
pub mod session;
pub mod types;

pub use actor::{Actor, ActorId, ActorState};
pub use errors::ActorError;
pub use message::{Message, MessageKind};
pub use pool::Poolable;
pub use session::Session;
pub use types::{ActorResult, BoxedActor, BoxedFuture};

// Re-export the derive macro
pub use zdopt_api_derive::Message;
