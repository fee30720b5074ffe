use ahash::AHashSet;
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::features::{FeatureMap, FeatureValue};
use crate::normalize::NormalizedUrl;
use crate::probe::{Probe, ProbeKind};

/// External reputation signal for one feature slot.
#[async_trait]
pub trait ReputationSource: Send + Sync {
    async fn lookup(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureValue>;
}

/// Answers the same value for every target.
#[derive(Debug, Clone, Copy)]
pub struct ConstantReputation(pub FeatureValue);

impl Default for ConstantReputation {
    fn default() -> Self {
        ConstantReputation(FeatureValue::SENTINEL)
    }
}

#[async_trait]
impl ReputationSource for ConstantReputation {
    async fn lookup(&self, _target: &NormalizedUrl) -> anyhow::Result<FeatureValue> {
        Ok(self.0)
    }
}

/// Operator-supplied list of known-bad registered domains. Listed: -1, otherwise 1.
#[derive(Debug, Clone, Default)]
pub struct BlocklistReputation {
    domains: AHashSet<String>,
}

impl BlocklistReputation {
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|d| !d.is_empty() && !d.starts_with('#'))
            .collect();
        Self { domains }
    }

    /// One domain per line; blank lines and `#` comments are skipped.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading blocklist {}", path.display()))?;
        Ok(Self::from_domains(data.lines()))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }
}

#[async_trait]
impl ReputationSource for BlocklistReputation {
    async fn lookup(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureValue> {
        let listed = self.contains(&target.domain) || self.contains(&target.host);
        Ok(if listed { FeatureValue::Minus } else { FeatureValue::Plus })
    }
}

/// Wraps one source as the probe for one reputation slot.
pub struct ReputationProbe {
    kind: ProbeKind,
    source: Arc<dyn ReputationSource>,
    timeout: Duration,
}

impl ReputationProbe {
    pub fn new(kind: ProbeKind, source: Arc<dyn ReputationSource>, timeout: Duration) -> Self {
        debug_assert!(ProbeKind::REPUTATION.contains(&kind));
        Self { kind, source, timeout }
    }
}

#[async_trait]
impl Probe for ReputationProbe {
    fn kind(&self) -> ProbeKind {
        self.kind
    }

    fn deadline(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureMap> {
        let value = self.source.lookup(target).await?;
        Ok(self.kind.features().iter().map(|f| (*f, value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    #[tokio::test]
    async fn constant_stub_yields_sentinel() {
        let source = Arc::new(ConstantReputation::default());
        let probe = ReputationProbe::new(ProbeKind::PageRank, source, Duration::from_secs(1));
        let target = NormalizedUrl::parse("example.com").unwrap();
        let map = probe.run(&target).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&Feature::PageRank], FeatureValue::Minus);
    }

    #[tokio::test]
    async fn blocklist_lookup() {
        let lines = ["# bad actors", "Evil.com", "", "phish.example.net."];
        let list = BlocklistReputation::from_domains(lines);
        assert_eq!(list.len(), 2);
        let evil = NormalizedUrl::parse("http://login.evil.com/x").unwrap();
        let fine = NormalizedUrl::parse("http://example.org").unwrap();
        let sub = NormalizedUrl::parse("http://phish.example.net").unwrap();
        assert_eq!(list.lookup(&evil).await.unwrap(), FeatureValue::Minus);
        assert_eq!(list.lookup(&fine).await.unwrap(), FeatureValue::Plus);
        assert_eq!(list.lookup(&sub).await.unwrap(), FeatureValue::Minus);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.txt");
        std::fs::write(&path, "bad.com\n# comment\nworse.org\n").unwrap();
        let list = BlocklistReputation::load(&path).unwrap();
        assert!(list.contains("bad.com"));
        assert!(list.contains("worse.org"));
        assert!(BlocklistReputation::load(&dir.path().join("missing")).is_err());
    }
}
