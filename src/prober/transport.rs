use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::Client;

use super::ConnectionPolicy;
use super::dns::DnsResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub proxy_from_env: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("ttfb/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            proxy_from_env: true,
        }
    }
}

/// Owns the shared connection pool. The pooled client is built on first use
/// and reused for the lifetime of the transport; disposable clients are built
/// per call and dropped with their connections.
pub struct Transport {
    settings: TransportSettings,
    shared: OnceCell<Client>,
}

impl Transport {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            shared: OnceCell::new(),
        }
    }

    pub fn client(&self, policy: ConnectionPolicy) -> reqwest::Result<Client> {
        match policy {
            ConnectionPolicy::Pooled => self
                .shared
                .get_or_try_init(|| self.build(policy))
                .cloned(),
            ConnectionPolicy::Disposable => self.build(policy),
        }
    }

    fn build(&self, policy: ConnectionPolicy) -> reqwest::Result<Client> {
        tracing::debug!("building {} http client", policy.as_str());
        let mut builder = Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .connect_timeout(self.settings.connect_timeout);

        if !self.settings.proxy_from_env {
            builder = builder.no_proxy();
        }

        builder = match policy {
            ConnectionPolicy::Pooled => builder.dns_resolver(DnsResolver::new(true).into_shared()),
            ConnectionPolicy::Disposable => builder
                .dns_resolver(DnsResolver::new(false).into_shared())
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Some(Duration::from_secs(0))),
        };

        builder.build()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportSettings::default())
    }
}
