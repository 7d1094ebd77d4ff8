use std::fmt;

use zdopt_api::Poolable;

/// Name the message pool is registered under.
pub const NET_MESSAGE_POOL: &str = "net_message_pool";

/// One received datagram, drawn from the message pool.
#[derive(Default)]
pub struct NetMessage {
    data: Vec<u8>,
}

impl NetMessage {
    /// Copy `bytes` in, reusing the buffer kept from earlier messages.
    pub fn parse(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Poolable for NetMessage {
    fn on_get(&mut self) {
        self.data.clear();
    }

    fn on_release(&mut self) {
        self.data.clear();
    }
}

impl fmt::Debug for NetMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetMessage").field("len", &self.data.len()).finish()
    }
}
