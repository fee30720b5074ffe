//! Feature-probe orchestrator.
//!
//! `Idle -> Normalizing -> ProbingInFlight -> Merging -> Done`, or `Normalizing -> Failed`
//! when the URL cannot be parsed. Every probe runs as its own task with its own deadline;
//! none of them can fail or delay the request as a whole.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bridge::BlockingBridge;
use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::features::FeatureVector;
use crate::http_client::create_page_client;
use crate::normalize::NormalizedUrl;
use crate::probe::dns::{DnsResolver, HickoryResolver};
use crate::probe::whois::{RegistrationLookup, RegistrationRecord, WhoisClient};
use crate::probe::{
    BlocklistReputation, CertificateInspector, ConstantReputation, HttpPageSource, PageProbe,
    PageSource, Probe, ProbeFailure, ProbeKind, ProbeOutcome, RegistrationProbe, ReputationProbe,
    ReputationSource, RustlsInspector, TlsProbe,
};
use crate::rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Normalizing,
    ProbingInFlight,
    Merging,
    Done,
    Failed,
}

/// How one probe ended for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub kind: ProbeKind,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub url: String,
    pub state: EngineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizedUrl>,
    pub features: FeatureVector,
    pub probes: Vec<ProbeReport>,
    pub elapsed_ms: u64,
}

impl ExtractionReport {
    pub fn probe(&self, kind: ProbeKind) -> Option<&ProbeReport> {
        self.probes.iter().find(|p| p.kind == kind)
    }
}

/// Everything the engine talks to. Swap any field for a test double.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub bridge: Arc<BlockingBridge>,
    pub registration_cache: Arc<TtlCache<RegistrationRecord>>,
    pub certificates: Arc<dyn CertificateInspector>,
    pub registry: Arc<dyn RegistrationLookup>,
    pub resolver: Arc<dyn DnsResolver>,
    pub pages: Arc<dyn PageSource>,
    pub reputation: Vec<(ProbeKind, Arc<dyn ReputationSource>)>,
}

impl Collaborators {
    /// Real network implementations configured from `config`.
    pub fn live(config: &EngineConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client = create_page_client(config)?;

        let blocklist: Option<Arc<dyn ReputationSource>> = match &config.blocklist_path {
            Some(path) => {
                let list = BlocklistReputation::load(path)?;
                tracing::info!("Loaded {} blocklisted domains from {}", list.len(), path.display());
                Some(Arc::new(list))
            }
            None => None,
        };

        Ok(Self {
            registration_cache: Arc::new(TtlCache::new(
                config.cache_ttl(),
                config.cache_capacity,
                clock.clone(),
            )),
            clock,
            bridge: Arc::new(BlockingBridge::new(config.workers)),
            certificates: Arc::new(RustlsInspector::new(config.verify_tls, config.tls_timeout())),
            registry: Arc::new(WhoisClient::new(config.whois_timeout())),
            resolver: Arc::new(HickoryResolver::new(config.dns_timeout())),
            pages: Arc::new(HttpPageSource::new(client, config.max_redirects)),
            reputation: default_reputation(blocklist),
        })
    }
}

/// Constant stubs for every reputation slot; a blocklist, when given, answers the
/// safe-browsing and phishing-report slots.
pub fn default_reputation(
    blocklist: Option<Arc<dyn ReputationSource>>,
) -> Vec<(ProbeKind, Arc<dyn ReputationSource>)> {
    let stub: Arc<dyn ReputationSource> = Arc::new(ConstantReputation::default());
    ProbeKind::REPUTATION
        .iter()
        .map(|kind| {
            let source = match (kind, &blocklist) {
                (ProbeKind::GoogleIndex | ProbeKind::StatisticalReport, Some(list)) => list.clone(),
                _ => stub.clone(),
            };
            (*kind, source)
        })
        .collect()
}

pub struct FeatureEngine {
    probes: Vec<Arc<dyn Probe>>,
    bridge: Arc<BlockingBridge>,
    registration_cache: Arc<TtlCache<RegistrationRecord>>,
}

impl FeatureEngine {
    pub fn new(config: &EngineConfig, deps: Collaborators) -> Self {
        let mut probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(TlsProbe::new(deps.certificates, deps.bridge.clone(), config.tls_timeout())),
            Arc::new(RegistrationProbe::new(
                deps.registry,
                deps.resolver,
                deps.registration_cache.clone(),
                deps.bridge.clone(),
                deps.clock,
                config.whois_timeout(),
                config.dns_timeout(),
            )),
            Arc::new(PageProbe::new(deps.pages, config.fetch_timeout())),
        ];
        if config.reputation_enabled {
            for (kind, source) in deps.reputation {
                let timeout = config.reputation_timeout();
                probes.push(Arc::new(ReputationProbe::new(kind, source, timeout)));
            }
        }
        Self { probes, bridge: deps.bridge, registration_cache: deps.registration_cache }
    }

    pub fn live(config: &EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self::new(config, Collaborators::live(config)?))
    }

    pub fn probe_kinds(&self) -> Vec<ProbeKind> {
        self.probes.iter().map(|p| p.kind()).collect()
    }

    pub fn bridge(&self) -> &BlockingBridge {
        &self.bridge
    }

    pub fn registration_cache(&self) -> &TtlCache<RegistrationRecord> {
        &self.registration_cache
    }

    /// The fixed-schema vector for `url`; all sentinel when the URL is unparsable.
    pub async fn extract_features(&self, url: &str) -> FeatureVector {
        self.extract(url).await.features
    }

    pub async fn extract(&self, url: &str) -> ExtractionReport {
        let started = Instant::now();
        let mut state = EngineState::Idle;
        transition(&mut state, EngineState::Normalizing, url);

        let target = match NormalizedUrl::parse(url) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("URL parsing error for {:?}: {}", url, e);
                transition(&mut state, EngineState::Failed, url);
                return ExtractionReport {
                    url: url.to_string(),
                    state,
                    error: Some(e.to_string()),
                    normalized: None,
                    features: FeatureVector::sentinel(),
                    probes: Vec::new(),
                    elapsed_ms: elapsed_ms(started.elapsed()),
                };
            }
        };
        tracing::info!("Analyzing URL: {}, Domain: {}", target.raw, target.domain);

        let mut features = FeatureVector::sentinel();
        features.merge(&rules::evaluate(&target));

        transition(&mut state, EngineState::ProbingInFlight, url);
        let target = Arc::new(target);
        let outcomes = self.fan_out(target.clone()).await;

        transition(&mut state, EngineState::Merging, url);
        let mut probes = Vec::with_capacity(outcomes.len());
        for (kind, outcome, elapsed) in outcomes {
            let failure = match outcome {
                ProbeOutcome::Features(map) => {
                    let owned = kind.features();
                    for (feature, value) in map.iter().filter(|(f, _)| owned.contains(f)) {
                        features.set(*feature, *value);
                    }
                    None
                }
                ProbeOutcome::Failed(failure) => {
                    tracing::warn!("{} probe failed for {}: {}", kind, target.domain, failure);
                    Some(failure)
                }
            };
            probes.push(ProbeReport {
                kind,
                ok: failure.is_none(),
                failure,
                elapsed_ms: elapsed_ms(elapsed),
            });
        }

        transition(&mut state, EngineState::Done, url);
        let report = ExtractionReport {
            url: url.to_string(),
            state,
            error: None,
            normalized: Some((*target).clone()),
            features,
            probes,
            elapsed_ms: elapsed_ms(started.elapsed()),
        };
        tracing::info!(
            "Finished {} in {}ms ({}/{} probes ok)",
            target.raw,
            report.elapsed_ms,
            report.probes.iter().filter(|p| p.ok).count(),
            report.probes.len()
        );
        report
    }

    /// Spawn every probe, then wait for all of them. Siblings are never cancelled.
    async fn fan_out(
        &self,
        target: Arc<NormalizedUrl>,
    ) -> Vec<(ProbeKind, ProbeOutcome, Duration)> {
        let handles = self.probes.iter().map(|probe| {
            let probe = probe.clone();
            let target = target.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let deadline = probe.deadline();
                let outcome = match tokio::time::timeout(deadline, probe.run(&target)).await {
                    Ok(Ok(map)) => ProbeOutcome::Features(map),
                    Ok(Err(e)) => ProbeOutcome::Failed(ProbeFailure::from_error(e)),
                    Err(_) => ProbeOutcome::Failed(ProbeFailure::timed_out(deadline)),
                };
                (outcome, started.elapsed())
            })
        });
        let joined = join_all(handles).await;

        self.probes
            .iter()
            .zip(joined)
            .map(|(probe, res)| match res {
                Ok((outcome, elapsed)) => (probe.kind(), outcome, elapsed),
                Err(e) => {
                    tracing::warn!("{} probe task aborted: {}", probe.kind(), e);
                    (probe.kind(), ProbeOutcome::Failed(ProbeFailure::Panicked), Duration::ZERO)
                }
            })
            .collect()
    }
}

fn transition(state: &mut EngineState, next: EngineState, url: &str) {
    tracing::debug!(url = %url, from = ?*state, to = ?next, "engine state");
    *state = next;
}

fn elapsed_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
