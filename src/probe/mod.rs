pub mod dns;
pub mod page;
pub mod registration;
pub mod reputation;
pub mod tls;
pub mod whois;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::features::{Feature, FeatureMap};
use crate::normalize::NormalizedUrl;

pub use page::{HttpPageSource, PageProbe, PageSource};
pub use registration::RegistrationProbe;
pub use reputation::{BlocklistReputation, ConstantReputation, ReputationProbe, ReputationSource};
pub use tls::{CertificateInspector, RustlsInspector, TlsProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Tls,
    Registration,
    Page,
    WebTraffic,
    PageRank,
    GoogleIndex,
    Backlinks,
    StatisticalReport,
}

impl ProbeKind {
    pub fn name(self) -> &'static str {
        match self {
            ProbeKind::Tls => "tls",
            ProbeKind::Registration => "registration",
            ProbeKind::Page => "page",
            ProbeKind::WebTraffic => "web_traffic",
            ProbeKind::PageRank => "page_rank",
            ProbeKind::GoogleIndex => "google_index",
            ProbeKind::Backlinks => "backlinks",
            ProbeKind::StatisticalReport => "statistical_report",
        }
    }

    /// Slots this probe is responsible for.
    pub fn features(self) -> &'static [Feature] {
        match self {
            ProbeKind::Tls => &[Feature::SslFinalState],
            ProbeKind::Registration => &[
                Feature::DomainRegistrationLength,
                Feature::AgeOfDomain,
                Feature::DnsRecord,
            ],
            ProbeKind::Page => &page::PAGE_FEATURES,
            ProbeKind::WebTraffic => &[Feature::WebTraffic],
            ProbeKind::PageRank => &[Feature::PageRank],
            ProbeKind::GoogleIndex => &[Feature::GoogleIndex],
            ProbeKind::Backlinks => &[Feature::LinksPointingToPage],
            ProbeKind::StatisticalReport => &[Feature::StatisticalReport],
        }
    }

    pub const REPUTATION: [ProbeKind; 5] = [
        ProbeKind::WebTraffic,
        ProbeKind::PageRank,
        ProbeKind::GoogleIndex,
        ProbeKind::Backlinks,
        ProbeKind::StatisticalReport,
    ];
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slack added on top of a probe's inner call timeouts so the inner timeout fires first.
pub const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Why a probe produced no features.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum ProbeFailure {
    #[error("timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
    #[error("{message}")]
    Error { message: String },
    #[error("probe panicked")]
    Panicked,
    #[error("not applicable to this target")]
    Unsupported,
}

impl ProbeFailure {
    pub fn timed_out(after: Duration) -> Self {
        ProbeFailure::TimedOut { after_ms: after.as_millis() as u64 }
    }

    /// Classify an error returned from `Probe::run`.
    pub fn from_error(err: anyhow::Error) -> Self {
        match err.downcast::<ProbeFailure>() {
            Ok(failure) => failure,
            Err(other) => ProbeFailure::Error { message: format!("{:#}", other) },
        }
    }
}

/// Result of one probe execution, consumed once by the merge step.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Features(FeatureMap),
    Failed(ProbeFailure),
}

/// One independent, fallible lookup that yields part of the feature vector.
#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    /// Upper bound on one `run`; the orchestrator fails the probe once it elapses.
    fn deadline(&self) -> Duration;

    async fn run(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureMap>;
}
