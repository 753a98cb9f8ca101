//! UDP datagram transport.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::TransportError;

/// A UDP socket bound to an ephemeral local port and locked to one server.
///
/// The transport itself is unreliable and unordered; everything that makes
/// it usable for chat (ids, confirms, retransmission, duplicate
/// suppression) lives in `natter-reliability`, not here.
pub struct DatagramTransport {
    socket: UdpSocket,
}

impl DatagramTransport {
    /// Binds a local socket on a dynamically assigned port and locks it to
    /// the server address, so later sends and receives need no per-packet
    /// addressing.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(TransportError::BindFailed)?;
        socket
            .connect((host, port))
            .await
            .map_err(TransportError::ConnectFailed)?;
        if let Ok(local) = socket.local_addr() {
            tracing::info!(host, port, %local, "datagram transport ready");
        }
        Ok(Self { socket })
    }

    /// Sends one datagram to the server.
    pub async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send(datagram)
            .await
            .map_err(TransportError::SendFailed)?;
        tracing::trace!(len = datagram.len(), "datagram sent");
        Ok(())
    }

    /// Waits for the next datagram and returns the number of bytes
    /// received into `buf`.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = self
            .socket
            .recv(buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        tracing::trace!(len = n, "datagram received");
        Ok(n)
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
