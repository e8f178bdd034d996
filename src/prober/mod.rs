use serde::Serialize;

pub mod dns;
pub mod http;
pub mod transport;

pub use http::{Headers, Measurement, probe_ttfb};
pub use transport::{Transport, TransportSettings};

/// How a measurement obtains its connection.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPolicy {
    /// Shared keep-alive pool and DNS cache owned by the transport.
    Pooled,
    /// Throwaway client: no idle connections, no cached addresses.
    Disposable,
}

impl ConnectionPolicy {
    pub const fn from_no_cache(no_cache: bool) -> Self {
        if no_cache { Self::Disposable } else { Self::Pooled }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pooled => "pooled",
            Self::Disposable => "disposable",
        }
    }
}
