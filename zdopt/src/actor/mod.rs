//! Mailbox-driven actors.

pub mod base;
pub mod mailbox;

pub use base::{BaseActor, Handler};
pub use mailbox::{Mailbox, MailboxReceiver};
