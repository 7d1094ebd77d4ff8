//! # Message Codec
//!
//! Serialization for messages that cross the transport boundary. A type must
//! be registered with the codec before it can be encoded or decoded, which
//! keeps the set of wire types explicit; an unregistered type is reported as
//! [`CodecError::Unregistered`].
//!
//! ```rust,ignore
//! use serde::{Deserialize, Serialize};
//! use zdopt::codec::{Codec, JsonCodec, WireMessage};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Login { player: u64 }
//!
//! impl WireMessage for Login {
//!     const TYPE_NAME: &'static str = "game.Login";
//! }
//!
//! let codec = JsonCodec::new();
//! codec.register::<Login>();
//! let bytes = codec.serialize(&Login { player: 7 })?;
//! let login: Login = codec.deserialize(&bytes)?;
//! ```

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::CodecError;

/// A message type with a stable wire name.
pub trait WireMessage: Serialize + DeserializeOwned + Send + 'static {
    /// Fully qualified name identifying the type on the wire.
    const TYPE_NAME: &'static str;
}

/// Encoding and decoding of registered wire messages.
pub trait Codec: Send + Sync {
    fn register<T: WireMessage>(&self);

    fn is_registered<T: WireMessage>(&self) -> bool;

    fn serialize<T: WireMessage>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    fn deserialize<T: WireMessage>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Default)]
pub struct JsonCodec {
    registered: RwLock<HashSet<&'static str>>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn check<T: WireMessage>(&self) -> Result<(), CodecError> {
        if self.is_registered::<T>() {
            Ok(())
        } else {
            Err(CodecError::Unregistered(T::TYPE_NAME))
        }
    }
}

impl Codec for JsonCodec {
    fn register<T: WireMessage>(&self) {
        if self.registered.write().insert(T::TYPE_NAME) {
            debug!(type_name = T::TYPE_NAME, "wire type registered");
        }
    }

    fn is_registered<T: WireMessage>(&self) -> bool {
        self.registered.read().contains(T::TYPE_NAME)
    }

    fn serialize<T: WireMessage>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        self.check::<T>()?;
        serde_json::to_vec(msg).map_err(|source| CodecError::Serialize {
            type_name: T::TYPE_NAME,
            source,
        })
    }

    fn deserialize<T: WireMessage>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.check::<T>()?;
        serde_json::from_slice(bytes).map_err(|source| CodecError::Deserialize {
            type_name: T::TYPE_NAME,
            source,
        })
    }
}
