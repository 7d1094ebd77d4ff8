//! Network intake.
//!
//! Transport is abstracted behind [`SessionSource`] and
//! [`zdopt_api::Session`]; the intake only moves bytes from sessions into
//! pooled [`NetMessage`]s and never interprets them.

mod intake;
mod message;
mod udp;

pub use intake::{IntakeStats, NetworkIntake, SessionSource};
pub use message::{NetMessage, NET_MESSAGE_POOL};
pub use udp::{UdpSession, UdpSessionSource};
