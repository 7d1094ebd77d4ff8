use std::io;

use async_trait::async_trait;

/// Read side of an established transport session.
///
/// The runtime never interprets read errors: a failed read returns the
/// session to its pool and the reader loops.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Read one datagram or chunk into `buf`, returning the number of bytes written.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Description of the remote end, for logs.
    fn peer(&self) -> String {
        "unknown".to_string()
    }
}
