use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::prober::{Transport, TransportSettings};

/// Transport that ignores proxy environment variables so requests reach the
/// local test server directly.
pub fn test_transport() -> Transport {
    Transport::new(TransportSettings {
        proxy_from_env: false,
        ..TransportSettings::default()
    })
}

#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    body: Vec<u8>,
    body_delay: Duration,
    content_length: Option<usize>,
    stall: Option<(usize, Duration)>,
    close_after_body: bool,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            body_delay: Duration::ZERO,
            content_length: None,
            stall: None,
            close_after_body: false,
        }
    }

    /// 200 announcing `declared` body bytes, then closing without sending any.
    pub fn truncated(declared: usize) -> Self {
        Self {
            content_length: Some(declared),
            close_after_body: true,
            ..Self::ok("")
        }
    }

    /// Stall between sending the headers and the first body byte.
    pub fn with_body_delay(mut self, delay: Duration) -> Self {
        self.body_delay = delay;
        self
    }

    /// Stall after the first `bytes` body bytes have been sent.
    pub fn with_stall_after(mut self, bytes: usize, delay: Duration) -> Self {
        self.stall = Some((bytes, delay));
        self
    }
}

/// Keep-alive HTTP/1.1 server answering every request with the same reply
/// and counting accepted connections.
pub struct TestServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(reply: Reply) -> Self {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) => panic!("Failed to bind test server: {err}"),
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => panic!("Failed to read test server addr: {err}"),
        };
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let reply = Arc::new(reply);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = reply.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_connection(stream, &reply).await {
                        tracing::debug!("test connection ended: {}", err);
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// URL by host name, so the request goes through the DNS resolver.
    pub fn localhost_url(&self, path: &str) -> String {
        format!("http://localhost:{}{}", self.addr.port(), path)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, reply: &Reply) -> std::io::Result<()> {
    let mut pending = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let head_end = loop {
            if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            pending.extend_from_slice(&buf[..n]);
        };
        pending.drain(..head_end);

        let reason = if reply.status == 200 { "OK" } else { "Test" };
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nX-Probe: first\r\nX-Probe: second\r\n\r\n",
            reply.status,
            reason,
            reply.content_length.unwrap_or(reply.body.len())
        );
        stream.write_all(head.as_bytes()).await?;
        stream.flush().await?;
        if !reply.body_delay.is_zero() {
            tokio::time::sleep(reply.body_delay).await;
        }
        let (lead, rest) = match reply.stall {
            Some((bytes, _)) => reply.body.split_at(bytes.min(reply.body.len())),
            None => (reply.body.as_slice(), &[][..]),
        };
        stream.write_all(lead).await?;
        stream.flush().await?;
        if let Some((_, delay)) = reply.stall {
            tokio::time::sleep(delay).await;
        }
        stream.write_all(rest).await?;
        stream.flush().await?;
        if reply.close_after_body {
            return stream.shutdown().await;
        }
    }
}
