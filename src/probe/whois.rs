//! Blocking port-43 WHOIS client and a tolerant record parser.

use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

const IANA_WHOIS: &str = "whois.iana.org";
const MAX_RESPONSE: usize = 64 * 1024;

/// Registration dates; either may be missing from a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub creation: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
}

/// Blocking lookup of a domain's registration record.
pub trait RegistrationLookup: Send + Sync {
    fn lookup(&self, domain: &str) -> anyhow::Result<RegistrationRecord>;
}

pub struct WhoisClient {
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn query(&self, server: &str, query: &str) -> anyhow::Result<String> {
        let addr = (server, 43u16)
            .to_socket_addrs()
            .with_context(|| format!("resolving whois server {}", server))?
            .next()
            .ok_or_else(|| anyhow!("no address for whois server {}", server))?;
        self.query_addr(addr, query)
    }

    /// One exchange, bounded by `timeout` as a whole rather than per read.
    fn query_addr(&self, addr: SocketAddr, query: &str) -> anyhow::Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(format!("{}\r\n", query).as_bytes())?;

        let too_slow = || anyhow!("whois answer from {} took longer than {:?}", addr, self.timeout);
        let mut response = Vec::new();
        let mut chunk = [0u8; 4096];
        while response.len() < MAX_RESPONSE {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(too_slow());
            }
            stream.set_read_timeout(Some(remaining))?;
            let n = match stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(too_slow())
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                break;
            }
            response.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    fn server_for(&self, domain: &str) -> anyhow::Result<String> {
        let tld = domain.rsplit('.').next().unwrap_or(domain);
        if let Some(server) = known_server(tld) {
            return Ok(server.to_string());
        }
        let answer = self.query(IANA_WHOIS, tld)?;
        referral(&answer).ok_or_else(|| anyhow!("no whois server known for .{}", tld))
    }
}

impl RegistrationLookup for WhoisClient {
    fn lookup(&self, domain: &str) -> anyhow::Result<RegistrationRecord> {
        let server = self.server_for(domain)?;
        tracing::debug!("Querying {} for {}", server, domain);
        let text = self.query(&server, domain)?;
        if is_unregistered(&text) {
            return Err(anyhow!("{} is not registered", domain));
        }
        Ok(parse_record(&text))
    }
}

/// Registry answers that mean "no such domain".
pub fn is_unregistered(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    ["no match", "not found", "no entries found"].iter().any(|m| lower.contains(m))
}

fn known_server(tld: &str) -> Option<&'static str> {
    let server = match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "io" => "whois.nic.io",
        "co" => "whois.nic.co",
        "me" => "whois.nic.me",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.nic.fr",
        "ru" => "whois.tcinet.ru",
        "ca" => "whois.cira.ca",
        "us" => "whois.nic.us",
        _ => return None,
    };
    Some(server)
}

fn referral(iana_answer: &str) -> Option<String> {
    iana_answer.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim().eq_ignore_ascii_case("refer") && !value.is_empty()).then(|| value.to_string())
    })
}

const CREATION_KEYS: &[&str] = &[
    "creation date",
    "created",
    "created on",
    "registered on",
    "registration time",
    "domain registration date",
    "registered",
];

const EXPIRATION_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expires",
    "expires on",
    "expire",
    "paid-till",
    "renewal date",
];

/// Extract the first creation and expiration dates from a raw record.
pub fn parse_record(text: &str) -> RegistrationRecord {
    let mut record = RegistrationRecord::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if record.creation.is_none() && CREATION_KEYS.contains(&key.as_str()) {
            record.creation = parse_date(value);
        } else if record.expiration.is_none() && EXPIRATION_KEYS.contains(&key.as_str()) {
            record.expiration = parse_date(value);
        }
    }
    record
}

pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Drop trailing zone names such as "UTC" or "(JST)"
    let head = value.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
    const FORMATS: [&str; 4] =
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&head, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    let first = value.split_whitespace().next().unwrap_or(value);
    let first = first.trim_end_matches('Z');
    for fmt in ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d-%b-%Y", "%d.%m.%Y", "%d/%m/%Y", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(first, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN: &str = "   Domain Name: EXAMPLE.COM\n\
        Registry Domain ID: 2336799_DOMAIN_COM-VRSN\n\
        Updated Date: 2023-08-14T07:01:38Z\n\
        Creation Date: 1995-08-14T04:00:00Z\n\
        Registry Expiry Date: 2024-08-13T04:00:00Z\n\
        Creation Date: 2001-01-01T00:00:00Z\n";

    #[test]
    fn parses_verisign_style_record() {
        let r = parse_record(VERISIGN);
        assert_eq!(r.creation, Some(Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap()));
        assert_eq!(r.expiration, Some(Utc.with_ymd_and_hms(2024, 8, 13, 4, 0, 0).unwrap()));
    }

    #[test]
    fn parses_nominet_and_ru_styles() {
        let uk = "    Registered on: 26-Aug-1996\n    Expiry date:  26-Aug-2030\n";
        let r = parse_record(uk);
        assert_eq!(r.creation, Some(Utc.with_ymd_and_hms(1996, 8, 26, 0, 0, 0).unwrap()));
        assert_eq!(r.expiration, Some(Utc.with_ymd_and_hms(2030, 8, 26, 0, 0, 0).unwrap()));

        let ru = "created:       1997-03-27T21:00:00Z\npaid-till:     2025-04-01T21:00:00Z\n";
        let r = parse_record(ru);
        assert!(r.creation.is_some());
        assert!(r.expiration.is_some());
    }

    #[test]
    fn missing_dates_stay_empty() {
        let r = parse_record("Domain Name: foo.example\nStatus: active\n");
        assert_eq!(r, RegistrationRecord::default());
    }

    #[test]
    fn date_formats() {
        let want = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        let written = [
            "2020-01-02",
            "2020.01.02",
            "2020/01/02",
            "02-Jan-2020",
            "2020-01-02 00:00:00 UTC",
        ];
        for v in written {
            assert_eq!(parse_date(v), Some(want), "{}", v);
        }
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn unregistered_answers() {
        assert!(is_unregistered("No match for \"NOPE-123.COM\".\r\n>>> Last update"));
        assert!(is_unregistered("%% NOT FOUND\n"));
        assert!(is_unregistered("No entries found for the selected source(s)."));
        assert!(!is_unregistered(VERISIGN));
    }

    #[test]
    fn slow_server_is_cut_off_by_the_overall_timeout() {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut sock, _)) = listener.accept() {
                // one byte every 50ms, never closing within the test window
                for _ in 0..40 {
                    if sock.write_all(b"x").is_err() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        });

        let client = WhoisClient::new(Duration::from_millis(300));
        let started = Instant::now();
        let err = client.query_addr(addr, "example.com").unwrap_err();
        assert!(err.to_string().contains("took longer"), "{}", err);
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn reads_full_answer_until_close() {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut sock, _)) = listener.accept() {
                let mut buf = [0u8; 64];
                let _ = sock.read(&mut buf);
                let _ = sock.write_all(VERISIGN.as_bytes());
            }
        });

        let client = WhoisClient::new(Duration::from_secs(2));
        let text = client.query_addr(addr, "example.com").unwrap();
        assert_eq!(parse_record(&text).creation.map(|d| d.timestamp()), Some(808_372_800));
    }

    #[test]
    fn iana_referral() {
        let answer = "% IANA WHOIS server\ndomain:       ORG\nrefer:        whois.pir.org\n";
        assert_eq!(referral(answer).as_deref(), Some("whois.pir.org"));
        assert_eq!(referral("domain: X\n"), None);
        assert_eq!(known_server("com"), Some("whois.verisign-grs.com"));
    }
}
