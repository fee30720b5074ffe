use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One value of the ternary feature domain.
///
/// `Minus` (-1) is the sentinel: "suspicious", "unknown" and "probe failed" all share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum FeatureValue {
    Minus,
    Zero,
    Plus,
}

impl FeatureValue {
    pub const SENTINEL: FeatureValue = FeatureValue::Minus;

    pub fn as_i8(self) -> i8 {
        match self {
            FeatureValue::Minus => -1,
            FeatureValue::Zero => 0,
            FeatureValue::Plus => 1,
        }
    }

    /// `Plus` when the condition holds, `Minus` otherwise.
    pub fn flag(condition: bool) -> Self {
        if condition { FeatureValue::Plus } else { FeatureValue::Minus }
    }
}

impl Default for FeatureValue {
    fn default() -> Self {
        FeatureValue::SENTINEL
    }
}

impl From<FeatureValue> for i8 {
    fn from(v: FeatureValue) -> i8 {
        v.as_i8()
    }
}

impl TryFrom<i8> for FeatureValue {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(FeatureValue::Minus),
            0 => Ok(FeatureValue::Zero),
            1 => Ok(FeatureValue::Plus),
            other => Err(format!("feature value out of range: {}", other)),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

macro_rules! feature_schema {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Named slots of the feature vector, in dataset column order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Feature {
            $($variant),+
        }

        impl Feature {
            pub const ALL: [Feature; 31] = [$(Feature::$variant),+];
            pub const COUNT: usize = Feature::ALL.len();

            pub fn name(self) -> &'static str {
                match self {
                    $(Feature::$variant => $name),+
                }
            }
        }
    };
}

feature_schema! {
    HavingIpAddress => "having_ip_address",
    UrlLength => "url_length",
    ShortiningService => "shortining_service",
    HavingAtSymbol => "having_at_symbol",
    DoubleSlashRedirecting => "double_slash_redirecting",
    PrefixSuffix => "prefix_suffix",
    HavingSubDomain => "having_sub_domain",
    SslFinalState => "sslfinal_state",
    DomainRegistrationLength => "domain_registeration_length",
    Favicon => "favicon",
    Port => "port",
    HttpsToken => "https_token",
    RequestUrl => "request_url",
    UrlOfAnchor => "url_of_anchor",
    LinksInTags => "links_in_tags",
    Sfh => "sfh",
    SubmittingToEmail => "submitting_to_email",
    AbnormalUrl => "abnormal_url",
    Redirect => "redirect",
    OnMouseover => "on_mouseover",
    RightClick => "rightclick",
    PopupWindow => "popupwidnow",
    Iframe => "iframe",
    AgeOfDomain => "age_of_domain",
    DnsRecord => "dnsrecord",
    WebTraffic => "web_traffic",
    PageRank => "page_rank",
    GoogleIndex => "google_index",
    LinksPointingToPage => "links_pointing_to_page",
    StatisticalReport => "statistical_report",
    Result => "result",
}

impl Feature {
    pub const LABEL: Feature = Feature::Result;

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Partial result of one rule set or probe.
pub type FeatureMap = BTreeMap<Feature, FeatureValue>;

/// Classifier decision stored in the label slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Legitimate,
    Phishing,
}

impl Label {
    pub fn as_i8(self) -> i8 {
        match self {
            Label::Legitimate => 0,
            Label::Phishing => 1,
        }
    }
}

/// Fixed-length vector in schema order. Slots never written hold the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureVector {
    values: [FeatureValue; Feature::COUNT],
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self { values: [FeatureValue::SENTINEL; Feature::COUNT] }
    }
}

impl FeatureVector {
    /// The all-sentinel vector returned for unparsable input.
    pub fn sentinel() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> FeatureValue {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: FeatureValue) {
        self.values[feature.index()] = value;
    }

    pub fn merge(&mut self, map: &FeatureMap) {
        for (feature, value) in map {
            self.set(*feature, *value);
        }
    }

    /// Label slot as a raw value: -1 while unlabeled, 0/1 afterwards.
    pub fn label(&self) -> i8 {
        self.get(Feature::LABEL).as_i8()
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.values[Feature::LABEL.index()] = match label {
            Label::Legitimate => FeatureValue::Zero,
            Label::Phishing => FeatureValue::Plus,
        };
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, FeatureValue)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    pub fn to_i8_vec(&self) -> Vec<i8> {
        self.values.iter().map(|v| v.as_i8()).collect()
    }

    /// The 30 risk features without the label slot, as consumed by a classifier.
    pub fn model_input(&self) -> Vec<i8> {
        self.iter()
            .filter(|(f, _)| *f != Feature::LABEL)
            .map(|(_, v)| v.as_i8())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value.as_i8())?;
        }
        map.end()
    }
}
