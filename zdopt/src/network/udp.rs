use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{ToSocketAddrs, UdpSocket};

use zdopt_api::Session;

use super::intake::SessionSource;

/// Sessions over one bound UDP socket.
///
/// Every session shares the socket, so any number of readers can receive
/// from it concurrently.
#[derive(Debug, Clone)]
pub struct UdpSessionSource {
    socket: Arc<UdpSocket>,
}

impl UdpSessionSource {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl SessionSource for UdpSessionSource {
    type Session = UdpSession;

    async fn open(&self) -> io::Result<UdpSession> {
        Ok(UdpSession {
            socket: self.socket.clone(),
        })
    }
}

#[derive(Debug)]
pub struct UdpSession {
    socket: Arc<UdpSocket>,
}

#[async_trait]
impl Session for UdpSession {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, _from) = self.socket.recv_from(buf).await?;
        Ok(n)
    }

    fn peer(&self) -> String {
        match self.socket.local_addr() {
            Ok(addr) => format!("udp://{}", addr),
            Err(_) => "udp".to_string(),
        }
    }
}
