use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod common;
mod message;

/// Derives the Message trait for a message enum.
///
/// The macro generates a fieldless companion enum with one variant per
/// message variant, implements `MessageKind` for it and implements
/// `Message` for the annotated enum. Actors key their handler registry by
/// the generated kind, so adding a message variant without a handler is
/// visible through `MessageKind::all()`.
///
/// # Features
///
/// ## 1. Default kind enum
/// ```rust,ignore
/// # use zdopt_api::{Message, MessageKind};
/// #[derive(Message)]
/// enum Lobby {
///     Join(u64),
///     Leave(u64),
/// }
///
/// assert_eq!(Lobby::Join(7).kind(), LobbyKind::Join);
/// ```
///
/// ## 2. Custom kind enum name
/// ```rust,ignore
/// # use zdopt_api::{Message, MessageKind};
/// #[derive(Message)]
/// #[message(kind = "CombatTag")]
/// enum Combat {
///     Hit { target: u64, damage: u32 },
///     Heal { target: u64, amount: u32 },
/// }
///
/// assert_eq!(CombatTag::all(), &[CombatTag::Hit, CombatTag::Heal]);
/// ```
///
/// ## 3. Custom kind names
/// ```rust,ignore
/// # use zdopt_api::{Message, MessageKind};
/// #[derive(Message)]
/// enum Session {
///     #[message(name = "session.open")]
///     Open,
///     #[message(name = "session.close")]
///     Close,
/// }
///
/// assert_eq!(Session::Open.kind().name(), "session.open");
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => common::darling_error(err),
    }
}
