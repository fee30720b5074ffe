use anyhow::anyhow;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Blocking A-record resolution.
pub trait DnsResolver: Send + Sync {
    fn resolve_a(&self, domain: &str) -> anyhow::Result<Vec<Ipv4Addr>>;
}

/// Resolver backed by the system configuration, falling back to public defaults.
pub struct HickoryResolver {
    timeout: Duration,
}

impl HickoryResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    // Built per call: the sync resolver owns a runtime, which must be created and
    // dropped on the blocking worker rather than an async one.
    fn build(&self) -> anyhow::Result<Resolver> {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.timeout = self.timeout;
        opts.attempts = 1;
        Ok(Resolver::new(config, opts)?)
    }
}

impl DnsResolver for HickoryResolver {
    fn resolve_a(&self, domain: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
        let resolver = self.build()?;
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let answer = resolver.ipv4_lookup(fqdn.as_str())?;
        let addrs: Vec<Ipv4Addr> = answer.iter().map(|a| a.0).collect();
        if addrs.is_empty() {
            return Err(anyhow!("no A records for {}", domain));
        }
        Ok(addrs)
    }
}
