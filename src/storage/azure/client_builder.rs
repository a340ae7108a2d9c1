use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

const TCP_KEEPALIVE_SECONDS: u64 = 60;

impl Config {
    /// Build the HTTP client shared by the lister and every delete worker.
    ///
    /// Connections are kept alive and the idle pool is sized to the worker
    /// count plus headroom so that a full pool never reconnects.
    pub fn create_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(self.connection_pool_size())
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECONDS))
            .user_agent(concat!("azrm/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = self.timeout_config.operation_timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        if let Some(timeout) = self.timeout_config.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(timeout));
        }

        builder.build().context("failed to create the HTTP client.")
    }
}
