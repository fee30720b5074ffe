use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::EngineConfig;

/// Client for the page probe.
///
/// Redirects are disabled here; the page source follows them itself to count hops.
pub fn create_page_client(config: &EngineConfig) -> anyhow::Result<Client> {
    let client = ClientBuilder::new()
        // Short-lived, one page per request
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Some(Duration::from_secs(30)))
        .tcp_nodelay(true)

        // Timeouts
        .timeout(config.fetch_timeout())
        .connect_timeout(config.tls_timeout())

        // Compression
        .gzip(true)
        .brotli(true)

        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(!config.verify_tls)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let mut config = EngineConfig::default();
        assert!(create_page_client(&config).is_ok());
        config.verify_tls = false;
        assert!(create_page_client(&config).is_ok());
    }
}
