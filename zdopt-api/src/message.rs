//! # Actor Message System
//!
//! Messages carry an explicit kind tag next to their payload. The kind is the
//! key of an actor's handler registry, so dispatch never inspects runtime type
//! names, and the full list of kinds is known at compile time.
//!
//! ## Usage Example
//!
//! ```rust
//! use zdopt_api::{Message, MessageKind};
//!
//! #[derive(Message)]
//! #[message(kind = "ChatKind")]
//! enum Chat {
//!     Say(String),
//!     Whisper { to: u64, text: String },
//! }
//!
//! assert_eq!(ChatKind::all().len(), 2);
//! assert_eq!(Chat::Say("hi".into()).kind(), ChatKind::Say);
//! ```

use std::fmt::Debug;
use std::hash::Hash;

/// Enumerated tag identifying the kind of a message.
///
/// Usually generated by `#[derive(Message)]`, one variant per message variant.
pub trait MessageKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Stable name of this kind, used in logs.
    fn name(&self) -> &'static str;

    /// Every kind of this message family.
    fn all() -> &'static [Self];
}

/// Core trait for defining actor messages.
pub trait Message: Send + 'static {
    /// Kind tag type of this message family
    type Kind: MessageKind;

    /// Kind of this particular message
    fn kind(&self) -> Self::Kind;
}
