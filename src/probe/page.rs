use anyhow::{anyhow, Context};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header, Client};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::features::{Feature, FeatureMap, FeatureValue};
use crate::normalize::{registered_domain_of, NormalizedUrl};
use crate::probe::{Probe, ProbeKind};

/// Slots filled from the fetched page.
pub const PAGE_FEATURES: [Feature; 13] = [
    Feature::Favicon,
    Feature::Port,
    Feature::HttpsToken,
    Feature::RequestUrl,
    Feature::UrlOfAnchor,
    Feature::LinksInTags,
    Feature::Sfh,
    Feature::SubmittingToEmail,
    Feature::Redirect,
    Feature::OnMouseover,
    Feature::RightClick,
    Feature::PopupWindow,
    Feature::Iframe,
];

const STANDARD_PORTS: [u16; 4] = [80, 443, 21, 22];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
    /// Number of redirect hops followed before the final response.
    pub redirects: usize,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage>;
}

/// Single GET with manual redirect following so the hop count is visible.
pub struct HttpPageSource {
    client: Client,
    max_redirects: usize,
}

impl HttpPageSource {
    pub fn new(client: Client, max_redirects: usize) -> Self {
        Self { client, max_redirects }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
        let mut current = Url::parse(url).with_context(|| format!("invalid page URL {}", url))?;
        let mut redirects = 0usize;
        loop {
            let resp = self.client.get(current.clone()).send().await?;
            if resp.status().is_redirection() {
                let location = resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok());
                if let Some(location) = location {
                    if redirects >= self.max_redirects {
                        return Err(anyhow!("too many redirects from {}", url));
                    }
                    current = current.join(location)?;
                    redirects += 1;
                    continue;
                }
            }
            let body = resp.text().await?;
            return Ok(FetchedPage { final_url: current.to_string(), body, redirects });
        }
    }
}

pub struct PageProbe {
    source: Arc<dyn PageSource>,
    timeout: Duration,
}

impl PageProbe {
    pub fn new(source: Arc<dyn PageSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }
}

#[async_trait]
impl Probe for PageProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Page
    }

    fn deadline(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, target: &NormalizedUrl) -> anyhow::Result<FeatureMap> {
        let page = self.source.fetch(&target.raw).await?;
        tracing::debug!(
            "Fetched {} ({} bytes, {} redirects)",
            page.final_url,
            page.body.len(),
            page.redirects
        );
        Ok(analyze_page(&page, target))
    }
}

static SEL_ICON: Lazy<Selector> = Lazy::new(|| sel("link[rel]"));
static SEL_IMG: Lazy<Selector> = Lazy::new(|| sel("img"));
static SEL_A: Lazy<Selector> = Lazy::new(|| sel("a"));
static SEL_TAGS: Lazy<Selector> = Lazy::new(|| sel("meta, script, link"));
static SEL_FORM: Lazy<Selector> = Lazy::new(|| sel("form"));
static SEL_MAILTO: Lazy<Selector> = Lazy::new(|| sel(r#"a[href^="mailto:"]"#));
static SEL_SCRIPT: Lazy<Selector> = Lazy::new(|| sel("script"));
static SEL_IFRAME: Lazy<Selector> = Lazy::new(|| sel("iframe"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// DOM and script heuristics over a fetched page.
pub fn analyze_page(page: &FetchedPage, target: &NormalizedUrl) -> FeatureMap {
    let doc = Html::parse_document(&page.body);
    let lower = page.body.to_lowercase();
    let domain = target.domain.as_str();

    let mut out = FeatureMap::new();
    out.insert(Feature::Favicon, favicon(&doc, domain));
    out.insert(
        Feature::Port,
        FeatureValue::flag(target.port.map_or(true, |p| STANDARD_PORTS.contains(&p))),
    );
    out.insert(
        Feature::HttpsToken,
        FeatureValue::flag(target.display_domain.to_lowercase().contains("https")),
    );
    out.insert(Feature::RequestUrl, request_url(&doc, domain));
    out.insert(Feature::UrlOfAnchor, url_of_anchor(&doc, domain));
    out.insert(Feature::LinksInTags, links_in_tags(&doc, domain));
    out.insert(Feature::Sfh, form_handler(&doc, domain));
    out.insert(Feature::SubmittingToEmail, FeatureValue::flag(submits_to_email(&doc)));
    out.insert(Feature::Redirect, redirect_bucket(page.redirects));
    out.insert(
        Feature::OnMouseover,
        FeatureValue::flag(
            lower.contains("onmouseover")
                && (lower.contains("window.location") || lower.contains("window.status")),
        ),
    );
    out.insert(
        Feature::RightClick,
        FeatureValue::flag(lower.contains("event.button==2") || lower.contains("oncontextmenu=")),
    );
    out.insert(
        Feature::PopupWindow,
        FeatureValue::flag(["window.open(", "alert(", "prompt("].iter().any(|p| lower.contains(p))),
    );
    out.insert(Feature::Iframe, FeatureValue::flag(doc.select(&SEL_IFRAME).next().is_some()));
    out
}

fn is_foreign(link: &str, domain: &str) -> bool {
    link.starts_with("http") && registered_domain_of(link).as_deref() != Some(domain)
}

fn bucket(ratio: f64, low: f64, high: f64) -> FeatureValue {
    if ratio < low {
        FeatureValue::Minus
    } else if ratio <= high {
        FeatureValue::Zero
    } else {
        FeatureValue::Plus
    }
}

fn ratio_of<'a, I, F>(elements: I, suspicious: F) -> Option<f64>
where
    I: Iterator<Item = ElementRef<'a>>,
    F: Fn(&ElementRef<'a>) -> bool,
{
    let (mut total, mut hits) = (0usize, 0usize);
    for el in elements {
        total += 1;
        if suspicious(&el) {
            hits += 1;
        }
    }
    (total > 0).then(|| hits as f64 / total as f64)
}

fn favicon(doc: &Html, domain: &str) -> FeatureValue {
    let icons: Vec<ElementRef> = doc
        .select(&SEL_ICON)
        .filter(|el| el.value().attr("rel").is_some_and(|r| r.to_lowercase().contains("icon")))
        .collect();
    let same_site = icons.iter().any(|el| {
        let href = el.value().attr("href").unwrap_or("");
        (href.starts_with("http") || href.starts_with("//"))
            && registered_domain_of(href).as_deref() == Some(domain)
    });
    FeatureValue::flag(same_site)
}

fn request_url(doc: &Html, domain: &str) -> FeatureValue {
    ratio_of(doc.select(&SEL_IMG), |el| is_foreign(el.value().attr("src").unwrap_or(""), domain))
        .map_or(FeatureValue::Minus, |r| bucket(r, 0.22, 0.61))
}

fn url_of_anchor(doc: &Html, domain: &str) -> FeatureValue {
    ratio_of(doc.select(&SEL_A), |el| {
        let href = el.value().attr("href").unwrap_or("");
        href == "#"
            || href == "javascript:void(0)"
            || href.contains("javascript:")
            || is_foreign(href, domain)
    })
    .map_or(FeatureValue::Minus, |r| bucket(r, 0.31, 0.67))
}

fn links_in_tags(doc: &Html, domain: &str) -> FeatureValue {
    ratio_of(doc.select(&SEL_TAGS), |el| {
        let v = el.value();
        let link = v.attr("src").filter(|s| !s.is_empty()).or_else(|| v.attr("href")).unwrap_or("");
        is_foreign(link, domain)
    })
    .map_or(FeatureValue::Minus, |r| bucket(r, 0.17, 0.81))
}

/// Server form handler: the first form with a blank or foreign action decides.
fn form_handler(doc: &Html, domain: &str) -> FeatureValue {
    for form in doc.select(&SEL_FORM) {
        let action = form.value().attr("action").unwrap_or("");
        if action.is_empty() || action == "about:blank" {
            return FeatureValue::Zero;
        }
        if is_foreign(action, domain) {
            return FeatureValue::Plus;
        }
    }
    FeatureValue::Minus
}

fn submits_to_email(doc: &Html) -> bool {
    doc.select(&SEL_MAILTO).next().is_some()
        || doc
            .select(&SEL_FORM)
            .any(|f| f.value().attr("action").unwrap_or("").contains("mailto:"))
        || doc
            .select(&SEL_SCRIPT)
            .any(|s| s.text().collect::<String>().contains("mail("))
}

fn redirect_bucket(hops: usize) -> FeatureValue {
    match hops {
        0 => FeatureValue::Minus,
        1 => FeatureValue::Zero,
        _ => FeatureValue::Plus,
    }
}
