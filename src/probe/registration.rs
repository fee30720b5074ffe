use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::BlockingBridge;
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::features::{Feature, FeatureMap, FeatureValue};
use crate::normalize::NormalizedUrl;
use crate::probe::dns::DnsResolver;
use crate::probe::whois::{RegistrationLookup, RegistrationRecord};
use crate::probe::{Probe, ProbeFailure, ProbeKind, DEADLINE_GRACE};

const MIN_REGISTRATION_DAYS: i64 = 365;
const MIN_AGE_DAYS: i64 = 180;

/// Registration length, domain age and DNS existence.
///
/// The WHOIS lookup is cached per domain; DNS always runs and does not depend on it.
pub struct RegistrationProbe {
    registry: Arc<dyn RegistrationLookup>,
    resolver: Arc<dyn DnsResolver>,
    cache: Arc<TtlCache<RegistrationRecord>>,
    bridge: Arc<BlockingBridge>,
    clock: Arc<dyn Clock>,
    whois_timeout: Duration,
    dns_timeout: Duration,
}

impl RegistrationProbe {
    pub fn new(
        registry: Arc<dyn RegistrationLookup>,
        resolver: Arc<dyn DnsResolver>,
        cache: Arc<TtlCache<RegistrationRecord>>,
        bridge: Arc<BlockingBridge>,
        clock: Arc<dyn Clock>,
        whois_timeout: Duration,
        dns_timeout: Duration,
    ) -> Self {
        Self { registry, resolver, cache, bridge, clock, whois_timeout, dns_timeout }
    }

    async fn record(&self, domain: &str) -> Option<RegistrationRecord> {
        if let Some(hit) = self.cache.get(ProbeKind::Registration, domain) {
            tracing::debug!("WHOIS cache hit for {}", domain);
            return Some(hit);
        }
        let registry = self.registry.clone();
        let owned = domain.to_string();
        match self
            .bridge
            .run_with_timeout(self.whois_timeout, move || registry.lookup(&owned))
            .await
        {
            Ok(record) => {
                self.cache.put(ProbeKind::Registration, domain, record.clone());
                Some(record)
            }
            Err(e) => {
                tracing::info!("WHOIS error for {}: {:#}", domain, e);
                None
            }
        }
    }

    async fn resolves(&self, domain: &str) -> bool {
        let resolver = self.resolver.clone();
        let owned = domain.to_string();
        match self
            .bridge
            .run_with_timeout(self.dns_timeout, move || resolver.resolve_a(&owned))
            .await
        {
            Ok(addrs) => !addrs.is_empty(),
            Err(e) => {
                tracing::debug!("DNS lookup failed for {}: {:#}", domain, e);
                false
            }
        }
    }
}

/// (registration length, age) from a record, relative to `now`.
pub fn date_features(
    record: Option<&RegistrationRecord>,
    now: DateTime<Utc>,
) -> (FeatureValue, FeatureValue) {
    match record {
        Some(RegistrationRecord { creation: Some(created), expiration: Some(expires) }) => {
            let length = (*expires - *created).num_days();
            let age = (now - *created).num_days();
            (
                FeatureValue::flag(length > MIN_REGISTRATION_DAYS),
                FeatureValue::flag(age > MIN_AGE_DAYS),
            )
        }
        _ => (FeatureValue::Minus, FeatureValue::Minus),
    }
}

#[async_trait]
impl Probe for RegistrationProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Registration
    }

    fn deadline(&self) -> Duration {
        self.whois_timeout.max(self.dns_timeout) + DEADLINE_GRACE
    }

    async fn run(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureMap> {
        if target.is_ip_literal {
            return Err(ProbeFailure::Unsupported.into());
        }
        let domain = target.domain.as_str();
        let (record, resolves) = tokio::join!(self.record(domain), self.resolves(domain));

        let (length, age) = date_features(record.as_ref(), self.clock.utc_now());
        Ok(FeatureMap::from([
            (Feature::DomainRegistrationLength, length),
            (Feature::AgeOfDomain, age),
            (Feature::DnsRecord, FeatureValue::flag(resolves)),
        ]))
    }
}
