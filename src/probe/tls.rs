use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{
    Certificate, ClientConfig, ClientConnection, OwnedTrustAnchor, RootCertStore, ServerName,
};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::bridge::BlockingBridge;
use crate::features::{Feature, FeatureMap, FeatureValue};
use crate::normalize::NormalizedUrl;
use crate::probe::{Probe, ProbeKind, DEADLINE_GRACE};

/// Leaf certificate facts gathered during a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// `notAfter` as a unix timestamp, when the field was present.
    pub not_after: Option<i64>,
}

/// Blocking handshake against `host:443`.
pub trait CertificateInspector: Send + Sync {
    fn inspect(&self, host: &str) -> anyhow::Result<CertificateInfo>;
}

pub struct RustlsInspector {
    config: Arc<ClientConfig>,
    timeout: Duration,
}

impl RustlsInspector {
    pub fn new(verify: bool, timeout: Duration) -> Self {
        let builder = ClientConfig::builder().with_safe_defaults();
        let config = if verify {
            let mut roots = RootCertStore::empty();
            roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
                OwnedTrustAnchor::from_subject_spki_name_constraints(
                    ta.subject,
                    ta.spki,
                    ta.name_constraints,
                )
            }));
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
                .with_no_client_auth()
        };
        Self { config: Arc::new(config), timeout }
    }
}

impl CertificateInspector for RustlsInspector {
    fn inspect(&self, host: &str) -> anyhow::Result<CertificateInfo> {
        let addr = (host, 443u16)
            .to_socket_addrs()
            .with_context(|| format!("resolving {}", host))?
            .next()
            .ok_or_else(|| anyhow!("no address for {}", host))?;

        let mut sock = TcpStream::connect_timeout(&addr, self.timeout)?;
        sock.set_read_timeout(Some(self.timeout))?;
        sock.set_write_timeout(Some(self.timeout))?;

        let server_name = ServerName::try_from(host)
            .map_err(|e| anyhow!("invalid server name {}: {}", host, e))?;
        let mut conn = ClientConnection::new(self.config.clone(), server_name)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock).context("tls handshake")?;
        }

        let leaf = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| anyhow!("server sent no certificate"))?;
        let (_, cert) = x509_parser::parse_x509_certificate(&leaf.0)
            .map_err(|e| anyhow!("unparsable certificate: {}", e))?;
        let not_after = cert.validity().not_after.timestamp();
        Ok(CertificateInfo { not_after: (not_after != 0).then_some(not_after) })
    }
}

/// Verifier used when strict verification is turned off.
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// `sslfinal_state`: 1 when the handshake succeeds and the certificate has an expiry.
pub struct TlsProbe {
    inspector: Arc<dyn CertificateInspector>,
    bridge: Arc<BlockingBridge>,
    timeout: Duration,
}

impl TlsProbe {
    pub fn new(
        inspector: Arc<dyn CertificateInspector>,
        bridge: Arc<BlockingBridge>,
        timeout: Duration,
    ) -> Self {
        Self { inspector, bridge, timeout }
    }
}

#[async_trait]
impl Probe for TlsProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Tls
    }

    fn deadline(&self) -> Duration {
        self.timeout + DEADLINE_GRACE
    }

    async fn run(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureMap> {
        let inspector = self.inspector.clone();
        let domain = target.domain.clone();
        let info = self
            .bridge
            .run_with_timeout(self.timeout, move || inspector.inspect(&domain))
            .await?;
        let value = FeatureValue::flag(info.not_after.is_some());
        Ok(FeatureMap::from([(Feature::SslFinalState, value)]))
    }
}
