//! URL normalization with public-suffix aware domain splitting.
//!
//! `news.example.co.uk` yields registered domain `example.co.uk` and subdomain `news`.

use serde::Serialize;
use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("empty URL")]
    Empty,
    #[error("malformed URL {input:?}: {reason}")]
    Malformed { input: String, reason: String },
    #[error("URL {0:?} has no host")]
    NoHost(String),
}

/// Parsed form of one request URL. Built once and shared read-only with every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedUrl {
    /// Input with the default scheme prepended when it was missing.
    pub raw: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path_and_query: String,
    /// Registered domain (`example.co.uk`); the bare host for IP literals and unknown suffixes.
    pub domain: String,
    /// Registered domain as written in the input: original case, Unicode labels kept.
    pub display_domain: String,
    /// Labels left of the registered domain, dot-joined; empty when there are none.
    pub subdomain: String,
    pub is_ip_literal: bool,
}

impl NormalizedUrl {
    pub fn parse(input: &str) -> Result<Self, NormalizeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(NormalizeError::Empty);
        }
        let raw = with_default_scheme(trimmed);

        let parsed = Url::parse(&raw).map_err(|e| NormalizeError::Malformed {
            input: raw.clone(),
            reason: e.to_string(),
        })?;

        let (host, is_ip_literal) = match parsed.host() {
            Some(Host::Domain(d)) if !d.is_empty() => (d.trim_end_matches('.').to_string(), false),
            Some(Host::Ipv4(ip)) => (ip.to_string(), true),
            Some(Host::Ipv6(ip)) => (ip.to_string(), true),
            _ => return Err(NormalizeError::NoHost(raw)),
        };
        if host.is_empty() {
            return Err(NormalizeError::NoHost(raw));
        }

        let (domain, subdomain) = if is_ip_literal {
            (host.clone(), String::new())
        } else {
            split_host(&host)
        };

        let display_domain = if is_ip_literal {
            domain.clone()
        } else {
            written_domain(&raw, &domain).unwrap_or_else(|| domain.clone())
        };

        let mut path_and_query = parsed.path().to_string();
        if let Some(q) = parsed.query() {
            path_and_query.push('?');
            path_and_query.push_str(q);
        }

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            port: parsed.port(),
            raw,
            host,
            path_and_query,
            domain,
            display_domain,
            subdomain,
            is_ip_literal,
        })
    }
}

fn with_default_scheme(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    }
}

/// Host portion of `raw` exactly as typed, without userinfo or port.
fn written_host(raw: &str) -> Option<&str> {
    let rest = raw.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#', '\\']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    };
    Some(host.trim_end_matches('.'))
}

/// The last labels of the written host matching the registered domain's label count.
/// `None` when the typed host does not line up label for label with the parsed one.
fn written_domain(raw: &str, domain: &str) -> Option<String> {
    let labels: Vec<&str> = written_host(raw)?.split('.').collect();
    let wanted = domain.split('.').count();
    if labels.len() < wanted || labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    Some(labels[labels.len() - wanted..].join("."))
}

/// Split a DNS host into (registered domain, subdomain).
pub fn split_host(host: &str) -> (String, String) {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = psl::domain_str(&host).unwrap_or(&host).to_string();
    let subdomain = host
        .strip_suffix(domain.as_str())
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or("")
        .to_string();
    (domain, subdomain)
}

/// Registered domain of an absolute or protocol-relative link found in a page.
pub fn registered_domain_of(link: &str) -> Option<String> {
    let link = link.trim();
    let absolute = if link.starts_with("//") { format!("http:{}", link) } else { link.to_string() };
    let parsed = Url::parse(&absolute).ok()?;
    match parsed.host()? {
        Host::Domain(d) => Some(split_host(d).0),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multi_label_suffix() {
        let n = NormalizedUrl::parse("https://news.example.co.uk/a?b=1").unwrap();
        assert_eq!(n.domain, "example.co.uk");
        assert_eq!(n.subdomain, "news");
        assert_eq!(n.host, "news.example.co.uk");
        assert_eq!(n.path_and_query, "/a?b=1");
        assert_eq!(n.scheme, "https");
    }

    #[test]
    fn prepends_default_scheme() {
        let n = NormalizedUrl::parse("example.com/login").unwrap();
        assert_eq!(n.raw, "http://example.com/login");
        assert_eq!(n.scheme, "http");
        assert_eq!(n.subdomain, "");
    }

    #[test]
    fn nested_subdomains() {
        let n = NormalizedUrl::parse("http://a.b.example.com").unwrap();
        assert_eq!(n.domain, "example.com");
        assert_eq!(n.subdomain, "a.b");
    }

    #[test]
    fn ip_literal_hosts() {
        let n = NormalizedUrl::parse("http://192.168.0.1/x").unwrap();
        assert!(n.is_ip_literal);
        assert_eq!(n.domain, "192.168.0.1");
        let v6 = NormalizedUrl::parse("http://[::1]:8080/").unwrap();
        assert!(v6.is_ip_literal);
        assert_eq!(v6.port, Some(8080));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(NormalizedUrl::parse("   "), Err(NormalizeError::Empty));
        assert!(NormalizedUrl::parse("http://").is_err());
        assert!(NormalizedUrl::parse("http://exa mple.com").is_err());
    }

    #[test]
    fn display_domain_keeps_written_form() {
        let upper = NormalizedUrl::parse("http://WWW.PayPal.COM:8080/signin").unwrap();
        assert_eq!(upper.domain, "paypal.com");
        assert_eq!(upper.display_domain, "PayPal.COM");

        let idn = NormalizedUrl::parse("http://user@shop.bücher.de/").unwrap();
        assert_eq!(idn.domain, "xn--bcher-kva.de");
        assert_eq!(idn.display_domain, "bücher.de");

        let ip = NormalizedUrl::parse("http://10.0.0.1/").unwrap();
        assert_eq!(ip.display_domain, "10.0.0.1");
    }

    #[test]
    fn link_domains() {
        assert_eq!(
            registered_domain_of("https://cdn.example.com/x.png").as_deref(),
            Some("example.com")
        );
        assert_eq!(registered_domain_of("//static.other.org/a.js").as_deref(), Some("other.org"));
        assert_eq!(registered_domain_of("/relative/path"), None);
    }
}
