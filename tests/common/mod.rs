#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use phish_probe::bridge::BlockingBridge;
use phish_probe::cache::TtlCache;
use phish_probe::clock::ManualClock;
use phish_probe::engine::default_reputation;
use phish_probe::features::FeatureValue;
use phish_probe::normalize::NormalizedUrl;
use phish_probe::probe::page::FetchedPage;
use phish_probe::probe::tls::CertificateInfo;
use phish_probe::probe::whois::{RegistrationLookup, RegistrationRecord};
use phish_probe::probe::dns::DnsResolver;
use phish_probe::probe::{CertificateInspector, PageSource, ProbeKind, ReputationSource};
use phish_probe::{Collaborators, EngineConfig, FeatureEngine};

pub const PAGE: &str = r#"<html><head>
<link rel="icon" href="https://www.example.com/favicon.ico">
<script src="https://cdn.tracker.net/t.js"></script>
</head><body>
<a href="/home">home</a><a href="https://www.example.com/about">about</a>
<img src="/logo.png">
<form action="/login"></form>
</body></html>"#;

pub struct FakeCerts {
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl CertificateInspector for FakeCerts {
    fn inspect(&self, _host: &str) -> anyhow::Result<CertificateInfo> {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(CertificateInfo { not_after: Some(1_900_000_000) })
    }
}

pub struct CountingRegistry {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingRegistry {
    pub fn new(fail: bool) -> Self {
        Self { calls: AtomicUsize::new(0), fail }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RegistrationLookup for CountingRegistry {
    fn lookup(&self, _domain: &str) -> anyhow::Result<RegistrationRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("whois server unreachable");
        }
        Ok(RegistrationRecord {
            creation: Some(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
            expiration: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        })
    }
}

pub struct FakeResolver {
    pub fail: bool,
}

impl DnsResolver for FakeResolver {
    fn resolve_a(&self, domain: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
        if self.fail {
            anyhow::bail!("NXDOMAIN for {}", domain);
        }
        Ok(vec![Ipv4Addr::new(93, 184, 216, 34)])
    }
}

pub struct ScriptedPages {
    pub body: String,
    pub redirects: usize,
    pub hang: bool,
    pub fetches: AtomicUsize,
}

impl ScriptedPages {
    pub fn serving(body: &str) -> Self {
        Self { body: body.to_string(), redirects: 0, hang: false, fetches: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl PageSource for ScriptedPages {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(FetchedPage {
            final_url: url.to_string(),
            body: self.body.clone(),
            redirects: self.redirects,
        })
    }
}

pub struct PanickingReputation;

#[async_trait]
impl ReputationSource for PanickingReputation {
    async fn lookup(&self, _target: &NormalizedUrl) -> anyhow::Result<FeatureValue> {
        panic!("reputation backend exploded");
    }
}

/// Test doubles wired into an engine. Fields can be tweaked before `build`.
pub struct Harness {
    pub config: EngineConfig,
    pub clock: Arc<ManualClock>,
    pub certs: Arc<FakeCerts>,
    pub registry: Arc<CountingRegistry>,
    pub resolver: Arc<FakeResolver>,
    pub pages: Arc<ScriptedPages>,
    pub reputation: Vec<(ProbeKind, Arc<dyn ReputationSource>)>,
}

impl Harness {
    pub fn new() -> Self {
        let config = EngineConfig {
            tls_timeout_ms: 500,
            whois_timeout_ms: 500,
            dns_timeout_ms: 500,
            fetch_timeout_ms: 500,
            reputation_timeout_ms: 500,
            ..EngineConfig::default()
        };
        Self {
            config,
            clock: Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            certs: Arc::new(FakeCerts { fail: false, delay: None }),
            registry: Arc::new(CountingRegistry::new(false)),
            resolver: Arc::new(FakeResolver { fail: false }),
            pages: Arc::new(ScriptedPages::serving(PAGE)),
            reputation: default_reputation(None),
        }
    }

    pub fn build(&self) -> FeatureEngine {
        let deps = Collaborators {
            clock: self.clock.clone(),
            bridge: Arc::new(BlockingBridge::new(self.config.workers)),
            registration_cache: Arc::new(TtlCache::new(
                self.config.cache_ttl(),
                self.config.cache_capacity,
                self.clock.clone(),
            )),
            certificates: self.certs.clone(),
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            pages: self.pages.clone(),
            reputation: self.reputation.clone(),
        };
        FeatureEngine::new(&self.config, deps)
    }
}
