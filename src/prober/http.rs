use std::collections::BTreeMap;

use reqwest::Response;
use reqwest::header::HeaderMap;
use tokio::time::{Duration, Instant, timeout};

use super::{ConnectionPolicy, Transport};
use crate::error::ProbeError;

/// Response headers by lower-cased name, values in the order received.
pub type Headers = BTreeMap<String, Vec<String>>;

/// A response whose first body frame has been read. The consumed bytes are
/// kept so [`Probe::finish`] can hand back the complete body.
#[derive(Debug)]
pub struct Probe {
    pub ttfb: Duration,
    pub status: u16,
    pub headers: Headers,
    url: String,
    started: Instant,
    deadline: Duration,
    prefix: Vec<u8>,
    eof: bool,
    response: Response,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub ttfb: Duration,
    pub total: Duration,
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Measurement {
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Issues one GET against `url` and returns once the first body byte (or the
/// end of an empty body) has arrived. `deadline` bounds the whole exchange,
/// including the body read in [`Probe::finish`].
pub async fn probe_ttfb(
    transport: &Transport,
    url: &str,
    no_cache: bool,
    deadline: Duration,
) -> Result<Probe, ProbeError> {
    let policy = ConnectionPolicy::from_no_cache(no_cache);
    let client = transport
        .client(policy)
        .map_err(|source| ProbeError::Connection {
            url: url.to_string(),
            source,
        })?;

    let started = Instant::now();
    let exchange = async {
        let mut response = client.get(url).send().await.map_err(|source| {
            if source.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_string(),
                    deadline,
                }
            } else {
                ProbeError::Connection {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        tracing::debug!("headers from {} after {:?}", url, started.elapsed());
        let first = response.chunk().await.map_err(|source| {
            if source.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_string(),
                    deadline,
                }
            } else {
                ProbeError::Read {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        Ok::<_, ProbeError>((response, first))
    };

    let (response, first) = timeout(deadline, exchange)
        .await
        .map_err(|_elapsed| ProbeError::Timeout {
            url: url.to_string(),
            deadline,
        })??;
    let ttfb = started.elapsed();

    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());
    tracing::info!(
        "ttfb {} {:?} (status {}, {})",
        url,
        ttfb,
        status,
        policy.as_str()
    );

    Ok(Probe {
        ttfb,
        status,
        headers,
        url: url.to_string(),
        started,
        deadline,
        eof: first.is_none(),
        prefix: first.map(|b| b.to_vec()).unwrap_or_default(),
        response,
    })
}

impl Probe {
    /// Reads the rest of the body behind the probed bytes.
    pub async fn finish(self) -> Result<Measurement, ProbeError> {
        let Self {
            ttfb,
            status,
            headers,
            url,
            started,
            deadline,
            prefix,
            eof,
            mut response,
        } = self;

        let mut body = prefix;
        if !eof {
            let remaining = deadline.saturating_sub(started.elapsed());
            let read_rest = async {
                while let Some(chunk) = response.chunk().await? {
                    body.extend_from_slice(&chunk);
                }
                Ok::<(), reqwest::Error>(())
            };
            match timeout(remaining, read_rest).await {
                Ok(Ok(())) => {}
                Ok(Err(source)) if source.is_timeout() => {
                    return Err(ProbeError::Timeout { url, deadline });
                }
                Ok(Err(source)) => return Err(ProbeError::Body { url, source }),
                Err(_elapsed) => return Err(ProbeError::Timeout { url, deadline }),
            }
        }
        let total = started.elapsed();
        tracing::debug!("read {} body bytes from {} in {:?}", body.len(), url, total);

        Ok(Measurement {
            ttfb,
            total,
            status,
            headers,
            body,
        })
    }
}

fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, TestServer, test_transport};

    const DEADLINE: Duration = Duration::from_secs(5);

    async fn measure(
        transport: &Transport,
        server: &TestServer,
        no_cache: bool,
    ) -> Result<Measurement, ProbeError> {
        probe_ttfb(transport, &server.url("/"), no_cache, DEADLINE)
            .await?
            .finish()
            .await
    }

    #[tokio::test]
    async fn empty_body_ttfb_is_header_arrival() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("")).await;
        let transport = test_transport();

        let probe = probe_ttfb(&transport, &server.url("/"), false, DEADLINE).await?;
        assert!(probe.ttfb < Duration::from_secs(1));
        assert_eq!(probe.status, 200);

        let measurement = probe.finish().await?;
        assert!(measurement.body.is_empty());
        assert!(measurement.ttfb <= measurement.total);
        Ok(())
    }

    #[tokio::test]
    async fn delayed_body_bounds_ttfb_from_below() -> Result<(), ProbeError> {
        let delay = Duration::from_millis(50);
        let server = TestServer::spawn(Reply::ok("hello world").with_body_delay(delay)).await;
        let transport = test_transport();

        let measurement = measure(&transport, &server, false).await?;
        assert!(measurement.ttfb >= delay, "ttfb {:?}", measurement.ttfb);
        assert!(measurement.ttfb < delay + Duration::from_secs(1));
        assert_eq!(measurement.body, b"hello world");
        Ok(())
    }

    #[tokio::test]
    async fn body_survives_probe_read_byte_for_byte() -> Result<(), ProbeError> {
        let body: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        let server = TestServer::spawn(Reply::ok(body.clone())).await;
        let transport = test_transport();

        let measurement = measure(&transport, &server, false).await?;
        assert_eq!(measurement.body.len(), body.len());
        assert!(measurement.body == body);
        Ok(())
    }

    #[tokio::test]
    async fn single_byte_body() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("x")).await;
        let transport = test_transport();

        let measurement = measure(&transport, &server, true).await?;
        assert_eq!(measurement.body, b"x");
        Ok(())
    }

    #[tokio::test]
    async fn pooled_measurements_share_a_connection() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("pooled")).await;
        let transport = test_transport();

        measure(&transport, &server, false).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        measure(&transport, &server, false).await?;

        assert_eq!(server.connections(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn no_cache_measurements_never_reuse() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("cold")).await;
        let transport = test_transport();

        measure(&transport, &server, true).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        measure(&transport, &server, true).await?;

        assert_eq!(server.connections(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn non_ok_status_still_measures() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::status(404, "missing")).await;
        let transport = test_transport();

        let measurement = measure(&transport, &server, false).await?;
        assert_eq!(measurement.status, 404);
        assert!(!measurement.is_ok());
        assert!(measurement.ttfb < Duration::from_secs(1));
        assert_eq!(measurement.body, b"missing");
        Ok(())
    }

    #[tokio::test]
    async fn repeated_headers_keep_order() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("h")).await;
        let transport = test_transport();

        let measurement = measure(&transport, &server, false).await?;
        assert_eq!(
            measurement.headers.get("x-probe"),
            Some(&vec!["first".to_string(), "second".to_string()])
        );
        assert_eq!(
            measurement.headers.get("content-length"),
            Some(&vec!["1".to_string()])
        );
        Ok(())
    }

    #[tokio::test]
    async fn stalled_body_hits_deadline() {
        let server = TestServer::spawn(
            Reply::ok("late").with_body_delay(Duration::from_millis(500)),
        )
        .await;
        let transport = test_transport();

        let result = probe_ttfb(
            &transport,
            &server.url("/"),
            false,
            Duration::from_millis(100),
        )
        .await;
        match result {
            Err(err @ ProbeError::Timeout { .. }) => assert_eq!(err.kind(), "timeout"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let addr = match std::net::TcpListener::bind("127.0.0.1:0").and_then(|l| l.local_addr()) {
            Ok(addr) => addr,
            Err(e) => panic!("bind failed: {e}"),
        };
        let transport = test_transport();

        let result = probe_ttfb(&transport, &format!("http://{addr}/"), true, DEADLINE).await;
        match result {
            Err(err @ ProbeError::Connection { .. }) => assert_eq!(err.kind(), "connection"),
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_before_first_byte_is_read_error() {
        let server = TestServer::spawn(Reply::truncated(10)).await;
        let transport = test_transport();

        let result = probe_ttfb(&transport, &server.url("/"), true, DEADLINE).await;
        match result {
            Err(err @ ProbeError::Read { .. }) => assert_eq!(err.kind(), "read"),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stall_after_first_byte_times_out_in_finish() -> Result<(), ProbeError> {
        let server = TestServer::spawn(
            Reply::ok("ab").with_stall_after(1, Duration::from_millis(500)),
        )
        .await;
        let transport = test_transport();

        let probe = probe_ttfb(
            &transport,
            &server.url("/"),
            true,
            Duration::from_millis(200),
        )
        .await?;
        assert!(probe.ttfb < Duration::from_millis(200));

        match probe.finish().await {
            Err(err @ ProbeError::Timeout { .. }) => assert_eq!(err.kind(), "timeout"),
            other => panic!("expected timeout, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn host_names_go_through_pooled_resolver() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("hi")).await;
        let transport = test_transport();
        let url = server.localhost_url("/");

        let first = probe_ttfb(&transport, &url, false, DEADLINE).await?.finish().await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = probe_ttfb(&transport, &url, false, DEADLINE).await?.finish().await?;

        assert_eq!(first.body, b"hi");
        assert_eq!(second.body, b"hi");
        assert_eq!(server.connections(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn host_names_go_through_uncached_resolver() -> Result<(), ProbeError> {
        let server = TestServer::spawn(Reply::ok("hi")).await;
        let transport = test_transport();
        let url = server.localhost_url("/");

        let first = probe_ttfb(&transport, &url, true, DEADLINE).await?.finish().await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = probe_ttfb(&transport, &url, true, DEADLINE).await?.finish().await?;

        assert_eq!(first.body, b"hi");
        assert_eq!(second.body, b"hi");
        assert_eq!(server.connections(), 2);
        Ok(())
    }
}
