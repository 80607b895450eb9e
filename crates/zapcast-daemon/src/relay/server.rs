//! Forwards MPEG-TS datagrams from the demultiplexer to one HTTP viewer.
//!
//! The relay binds a UDP socket for dvblast's output and a TCP listener
//! for viewers. One viewer is served at a time; whoever connects gets a
//! fixed HTTP response header followed by raw transport stream bytes.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zapcast_core::config::RelayConfig;

/// Listener backlog for viewer connections.
const HTTP_BACKLOG: u32 = 10;

/// Receive buffer size, large enough for dvblast's UDP datagrams.
const RECV_BUFFER_SIZE: usize = 4096;

/// Response header sent to every viewer before stream bytes.
pub const RESPONSE_HEADER: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: video/mp2t\r\nConnection: keep-alive\r\n\r\n";

/// Errors from relay socket setup.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to bind UDP ingress {addr}: {source}")]
    BindUdp {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind HTTP endpoint {addr}: {source}")]
    BindHttp {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Stream relay with both sockets bound.
pub struct StreamRelay {
    udp: UdpSocket,
    listener: TcpListener,
    udp_addr: SocketAddr,
    http_addr: SocketAddr,
}

impl StreamRelay {
    /// Bind the UDP ingress and the HTTP listener.
    ///
    /// Binding happens before the demultiplexer is launched, so the
    /// addresses reported by [`udp_addr`](Self::udp_addr) and
    /// [`http_addr`](Self::http_addr) are the resolved ones even when the
    /// config requested ephemeral ports.
    pub async fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        let udp = UdpSocket::bind(config.udp_addr)
            .await
            .map_err(|e| RelayError::BindUdp {
                addr: config.udp_addr,
                source: e,
            })?;
        let udp_addr = udp.local_addr().map_err(|e| RelayError::BindUdp {
            addr: config.udp_addr,
            source: e,
        })?;

        let listener = bind_listener(config.http_addr).map_err(|e| RelayError::BindHttp {
            addr: config.http_addr,
            source: e,
        })?;
        let http_addr = listener.local_addr().map_err(|e| RelayError::BindHttp {
            addr: config.http_addr,
            source: e,
        })?;

        debug!(udp = %udp_addr, http = %http_addr, "Relay sockets bound");
        Ok(Self {
            udp,
            listener,
            udp_addr,
            http_addr,
        })
    }

    /// Resolved UDP ingress address.
    pub const fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Resolved HTTP endpoint address.
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Serve viewers until cancelled.
    ///
    /// Stream bytes arriving while no viewer is connected are left in the
    /// UDP receive buffer; the kernel discards the overflow.
    pub async fn run(self, token: CancellationToken) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        'accept: loop {
            let (mut viewer, peer) = tokio::select! {
                () = token.cancelled() => break 'accept,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept viewer connection");
                        continue;
                    }
                },
            };
            info!(%peer, "Viewer connected");

            tokio::select! {
                () = token.cancelled() => break 'accept,
                result = self.serve_viewer(&mut viewer, &mut buf) => {
                    if let Err(e) = result {
                        debug!(%peer, error = %e, "Viewer connection closed");
                    }
                }
            }
        }
        debug!("Relay stopped");
    }

    /// Send the response header, then copy datagrams until the viewer
    /// drops.
    ///
    /// The viewer's request bytes are never read; any connection gets the
    /// stream regardless of the request line.
    async fn serve_viewer(
        &self,
        viewer: &mut TcpStream,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        viewer.write_all(RESPONSE_HEADER).await?;
        viewer.flush().await?;
        loop {
            let (len, _) = self.udp.recv_from(buf).await?;
            viewer.write_all(&buf[..len]).await?;
        }
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(HTTP_BACKLOG)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn ephemeral_relay() -> RelayConfig {
        RelayConfig {
            udp_addr: "127.0.0.1:0".parse().unwrap(),
            http_addr: "127.0.0.1:0".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn bind_reports_actual_addresses() {
        let relay = StreamRelay::bind(&ephemeral_relay()).await.unwrap();
        assert_ne!(relay.udp_addr().port(), 0);
        assert_ne!(relay.http_addr().port(), 0);
        assert!(relay.udp_addr().ip().is_loopback());
        assert!(relay.http_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn viewer_receives_header_and_datagrams_in_order() {
        let relay = StreamRelay::bind(&ephemeral_relay()).await.unwrap();
        let udp_addr = relay.udp_addr();
        let http_addr = relay.http_addr();
        let token = CancellationToken::new();
        let handle = tokio::spawn(relay.run(token.clone()));

        let mut viewer = TcpStream::connect(http_addr).await.unwrap();
        let mut header = vec![0u8; RESPONSE_HEADER.len()];
        viewer.read_exact(&mut header).await.unwrap();
        assert_eq!(header, RESPONSE_HEADER);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"AAA", udp_addr).await.unwrap();
        sender.send_to(b"BBB", udp_addr).await.unwrap();

        let mut payload = [0u8; 6];
        viewer.read_exact(&mut payload).await.unwrap();
        assert_eq!(&payload, b"AAABBB");

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_closes_listener() {
        let relay = StreamRelay::bind(&ephemeral_relay()).await.unwrap();
        let http_addr = relay.http_addr();
        let token = CancellationToken::new();
        let handle = tokio::spawn(relay.run(token.clone()));

        token.cancel();
        handle.await.unwrap();

        assert!(TcpStream::connect(http_addr).await.is_err());
    }

    #[tokio::test]
    async fn viewer_disconnect_returns_to_accepting() {
        let relay = StreamRelay::bind(&ephemeral_relay()).await.unwrap();
        let udp_addr = relay.udp_addr();
        let http_addr = relay.http_addr();
        let token = CancellationToken::new();
        let handle = tokio::spawn(relay.run(token.clone()));

        // Keeps datagrams flowing so the relay notices the dropped viewer
        // on its next write.
        let feeder = tokio::spawn(async move {
            let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            loop {
                sender.send_to(b"TS", udp_addr).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        {
            let mut viewer = TcpStream::connect(http_addr).await.unwrap();
            let mut header = vec![0u8; RESPONSE_HEADER.len()];
            viewer.read_exact(&mut header).await.unwrap();
        }

        let mut viewer = TcpStream::connect(http_addr).await.unwrap();
        let mut header = vec![0u8; RESPONSE_HEADER.len()];
        tokio::time::timeout(Duration::from_secs(5), viewer.read_exact(&mut header))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(header, RESPONSE_HEADER);

        feeder.abort();
        token.cancel();
        handle.await.unwrap();
    }
}
