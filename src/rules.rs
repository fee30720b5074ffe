use crate::features::{Feature, FeatureMap, FeatureValue};
use crate::normalize::NormalizedUrl;

/// Known URL shortening services.
pub const SHORTENING_SERVICES: &[&str] = &[
    "bit.ly", "goo.gl", "tinyurl.com", "t.co", "is.gd",
    "shorte.st", "ow.ly", "buff.ly", "tiny.cc", "lnkd.in",
];

/// Lexical features computed straight from the URL. No I/O, never fails.
pub fn evaluate(url: &NormalizedUrl) -> FeatureMap {
    let mut out = FeatureMap::new();
    out.insert(Feature::HavingIpAddress, FeatureValue::flag(url.is_ip_literal));
    out.insert(Feature::UrlLength, url_length(&url.raw));
    let written = url.display_domain.to_lowercase();
    out.insert(Feature::ShortiningService, FeatureValue::flag(is_shortener(&written)));
    out.insert(Feature::HavingAtSymbol, FeatureValue::flag(url.raw.contains('@')));
    out.insert(
        Feature::DoubleSlashRedirecting,
        FeatureValue::flag(url.path_and_query.contains("//")),
    );
    out.insert(Feature::PrefixSuffix, FeatureValue::flag(written.contains('-')));
    out.insert(Feature::HavingSubDomain, subdomain_depth(&url.subdomain));
    out.insert(
        Feature::AbnormalUrl,
        FeatureValue::flag(!url.raw.to_lowercase().contains(written.as_str())),
    );
    out
}

/// < 54 chars: -1, 54..=75: 0, longer: 1.
pub fn url_length(raw: &str) -> FeatureValue {
    match raw.chars().count() {
        n if n < 54 => FeatureValue::Minus,
        n if n <= 75 => FeatureValue::Zero,
        _ => FeatureValue::Plus,
    }
}

// Substring match, so `t.co` also hits domains that merely contain it.
fn is_shortener(domain: &str) -> bool {
    SHORTENING_SERVICES.iter().any(|s| domain.contains(s))
}

fn subdomain_depth(subdomain: &str) -> FeatureValue {
    if subdomain.is_empty() {
        FeatureValue::Minus
    } else if !subdomain.contains('.') {
        FeatureValue::Zero
    } else {
        FeatureValue::Plus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(u: &str) -> FeatureMap {
        evaluate(&NormalizedUrl::parse(u).unwrap())
    }

    fn url_of_len(n: usize) -> String {
        let base = "http://example.com/";
        format!("{}{}", base, "a".repeat(n - base.len()))
    }

    #[test]
    fn url_length_boundaries() {
        assert_eq!(eval(&url_of_len(53))[&Feature::UrlLength], FeatureValue::Minus);
        assert_eq!(eval(&url_of_len(54))[&Feature::UrlLength], FeatureValue::Zero);
        assert_eq!(eval(&url_of_len(60))[&Feature::UrlLength], FeatureValue::Zero);
        assert_eq!(eval(&url_of_len(75))[&Feature::UrlLength], FeatureValue::Zero);
        assert_eq!(eval(&url_of_len(76))[&Feature::UrlLength], FeatureValue::Plus);
        assert_eq!(eval(&url_of_len(90))[&Feature::UrlLength], FeatureValue::Plus);
    }

    #[test]
    fn at_symbol() {
        assert_eq!(eval("http://a@b.com")[&Feature::HavingAtSymbol], FeatureValue::Plus);
        assert_eq!(eval("http://b.com")[&Feature::HavingAtSymbol], FeatureValue::Minus);
    }

    #[test]
    fn ip_literal() {
        assert_eq!(eval("http://10.0.0.1/login")[&Feature::HavingIpAddress], FeatureValue::Plus);
        assert_eq!(eval("http://[2001:db8::1]/")[&Feature::HavingIpAddress], FeatureValue::Plus);
        assert_eq!(eval("http://example.com")[&Feature::HavingIpAddress], FeatureValue::Minus);
    }

    #[test]
    fn shortener_and_hyphen() {
        assert_eq!(eval("bit.ly/abc")[&Feature::ShortiningService], FeatureValue::Plus);
        assert_eq!(eval("example.com")[&Feature::ShortiningService], FeatureValue::Minus);
        assert_eq!(eval("http://pay-pal.com")[&Feature::PrefixSuffix], FeatureValue::Plus);
        assert_eq!(eval("http://sub-x.paypal.com")[&Feature::PrefixSuffix], FeatureValue::Minus);
    }

    #[test]
    fn double_slash_outside_scheme() {
        let f = |u: &str| eval(u)[&Feature::DoubleSlashRedirecting];
        assert_eq!(f("http://example.com/a//b"), FeatureValue::Plus);
        assert_eq!(f("http://example.com/?r=http://evil.com"), FeatureValue::Plus);
        assert_eq!(f("http://example.com/a/b"), FeatureValue::Minus);
    }

    #[test]
    fn subdomain_depth_buckets() {
        assert_eq!(eval("http://example.com")[&Feature::HavingSubDomain], FeatureValue::Minus);
        assert_eq!(eval("http://www.example.com")[&Feature::HavingSubDomain], FeatureValue::Zero);
        assert_eq!(eval("http://a.b.example.com")[&Feature::HavingSubDomain], FeatureValue::Plus);
    }

    #[test]
    fn abnormal_url() {
        let f = |u: &str| eval(u)[&Feature::AbnormalUrl];
        assert_eq!(f("http://www.example.com/x"), FeatureValue::Minus);
        assert_eq!(f("http://WWW.PAYPAL.COM/signin"), FeatureValue::Minus);
        assert_eq!(f("http://bücher.de/"), FeatureValue::Minus);
    }

    #[test]
    fn idn_domains_are_judged_as_written() {
        let idn = eval("http://shop.bücher.de/kasse");
        assert_eq!(idn[&Feature::PrefixSuffix], FeatureValue::Minus);
        assert_eq!(idn[&Feature::ShortiningService], FeatureValue::Minus);
        assert_eq!(eval("http://bü-cher.de/")[&Feature::PrefixSuffix], FeatureValue::Plus);
        assert_eq!(eval("http://BIT.LY/abc")[&Feature::ShortiningService], FeatureValue::Plus);
    }
}
