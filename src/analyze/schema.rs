//! Structured record types and LLM response validation.
//!
//! The model is asked for a fixed key set. Validation is strict about the
//! shape (missing or mistyped keys fail the whole response) but lenient about
//! spelling inside the closed vocabularies: event tags and outlook labels are
//! matched case- and punctuation-insensitively, and unknown event tags are
//! dropped instead of failing the record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::source::SourceDescriptor;

/// Corporate-action tags the model may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventTag {
    #[serde(rename = "Order Wins")]
    OrderWins,
    #[serde(rename = "Acquisition")]
    Acquisition,
    #[serde(rename = "Capex")]
    Capex,
    #[serde(rename = "New Product")]
    NewProduct,
    #[serde(rename = "Got Acquired")]
    GotAcquired,
    #[serde(rename = "Govt Policy")]
    GovtPolicy,
    #[serde(rename = "QIP")]
    Qip,
    #[serde(rename = "Rights Issue")]
    RightsIssue,
    #[serde(rename = "Fund Raise")]
    FundRaise,
    #[serde(rename = "Partnership")]
    Partnership,
    #[serde(rename = "Diversification Plans")]
    DiversificationPlans,
    #[serde(rename = "NCD")]
    Ncd,
    #[serde(rename = "NCLT order")]
    NcltOrder,
    #[serde(rename = "Bullish Analysts")]
    BullishAnalysts,
    #[serde(rename = "Import/Export Tariffs")]
    ImportExportTariffs,
    #[serde(rename = "Demerger")]
    Demerger,
    #[serde(rename = "Debt-Reduction")]
    DebtReduction,
}

impl EventTag {
    /// The whole vocabulary, in prompt order.
    pub const ALL: [EventTag; 17] = [
        Self::OrderWins,
        Self::Acquisition,
        Self::Capex,
        Self::NewProduct,
        Self::GotAcquired,
        Self::GovtPolicy,
        Self::Qip,
        Self::RightsIssue,
        Self::FundRaise,
        Self::Partnership,
        Self::DiversificationPlans,
        Self::Ncd,
        Self::NcltOrder,
        Self::BullishAnalysts,
        Self::ImportExportTariffs,
        Self::Demerger,
        Self::DebtReduction,
    ];

    /// Canonical label, as shown to the model and written to outputs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::OrderWins => "Order Wins",
            Self::Acquisition => "Acquisition",
            Self::Capex => "Capex",
            Self::NewProduct => "New Product",
            Self::GotAcquired => "Got Acquired",
            Self::GovtPolicy => "Govt Policy",
            Self::Qip => "QIP",
            Self::RightsIssue => "Rights Issue",
            Self::FundRaise => "Fund Raise",
            Self::Partnership => "Partnership",
            Self::DiversificationPlans => "Diversification Plans",
            Self::Ncd => "NCD",
            Self::NcltOrder => "NCLT order",
            Self::BullishAnalysts => "Bullish Analysts",
            Self::ImportExportTariffs => "Import/Export Tariffs",
            Self::Demerger => "Demerger",
            Self::DebtReduction => "Debt-Reduction",
        }
    }

    /// Matches a model-supplied label against the vocabulary.
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        let wanted = normalize_label(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|tag| normalize_label(tag.label()) == wanted)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Management's forward-looking sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outlook {
    Challenging,
    Good,
    Favorable,
}

impl Outlook {
    /// Canonical label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Challenging => "Challenging",
            Self::Good => "Good",
            Self::Favorable => "Favorable",
        }
    }

    /// Matches a model-supplied outlook.
    ///
    /// `Favorable/Excellent`, `Excellent` and the British spelling all map to
    /// [`Outlook::Favorable`].
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "challenging" => Some(Self::Challenging),
            "good" => Some(Self::Good),
            "favorable" | "favourable" | "favorableexcellent" | "favourableexcellent"
            | "excellent" => Some(Self::Favorable),
            _ => None,
        }
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named financial deltas requested from the model, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKey {
    #[serde(rename = "QoQRevenue")]
    QoqRevenue,
    #[serde(rename = "YoYRevenue")]
    YoyRevenue,
    #[serde(rename = "QoQProfit")]
    QoqProfit,
    #[serde(rename = "YoYProfit")]
    YoyProfit,
}

impl MetricKey {
    /// All metrics, in output column order.
    pub const ALL: [MetricKey; 4] = [
        Self::QoqRevenue,
        Self::YoyRevenue,
        Self::QoqProfit,
        Self::YoyProfit,
    ];

    /// JSON key used in prompts, responses and outputs.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::QoqRevenue => "QoQRevenue",
            Self::YoyRevenue => "YoYRevenue",
            Self::QoqProfit => "QoQProfit",
            Self::YoyProfit => "YoYProfit",
        }
    }
}

/// Canonical output unit: one validated analysis of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecord {
    pub source_identity: String,
    pub company_label: String,
    pub source_url: String,
    pub metrics: BTreeMap<MetricKey, Option<f64>>,
    pub events: BTreeSet<EventTag>,
    pub outlook: Outlook,
    pub extracted_at: DateTime<Utc>,
}

impl StructuredRecord {
    /// Attaches a validated analysis to its source.
    #[must_use]
    pub fn from_analysis(source: &SourceDescriptor, analysis: ValidatedAnalysis) -> Self {
        Self {
            source_identity: source.identity().to_string(),
            company_label: source.company().to_string(),
            source_url: source.locator().to_string(),
            metrics: analysis.metrics,
            events: analysis.events,
            outlook: analysis.outlook,
            extracted_at: Utc::now(),
        }
    }

    /// Value of one metric, `None` when the model reported null.
    #[must_use]
    pub fn metric(&self, key: MetricKey) -> Option<f64> {
        self.metrics.get(&key).copied().flatten()
    }
}

/// The validated content of one model response, before it is tied to a source.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnalysis {
    pub metrics: BTreeMap<MetricKey, Option<f64>>,
    pub events: BTreeSet<EventTag>,
    /// Event labels outside the vocabulary, kept only for logging.
    pub dropped_events: Vec<String>,
    pub outlook: Outlook,
}

/// Validates the model's message content.
///
/// # Errors
///
/// Returns a description of the first schema violation: content that is not
/// a JSON object, a missing or mistyped metric, a non-array `events`, or a
/// missing or unrecognized outlook.
pub fn validate_response(content: &str) -> Result<ValidatedAnalysis, String> {
    let cleaned = strip_wrappers(content);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| format!("response is not JSON: {e}"))?;
    let Value::Object(object) = value else {
        return Err("response is not a JSON object".to_string());
    };

    let mut metrics = BTreeMap::new();
    for key in MetricKey::ALL {
        metrics.insert(key, read_metric(&object, key)?);
    }

    let (events, dropped_events) = read_events(&object)?;
    let outlook = read_outlook(&object)?;

    Ok(ValidatedAnalysis {
        metrics,
        events,
        dropped_events,
        outlook,
    })
}

fn read_metric(object: &Map<String, Value>, key: MetricKey) -> Result<Option<f64>, String> {
    let name = key.key();
    match object.get(name) {
        None => Err(format!("missing key `{name}`")),
        Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("`{name}` is not a finite number")),
        Some(Value::String(s)) => parse_numeric_string(s)
            .ok_or_else(|| format!("`{name}` is not numeric: {s:?}")),
        Some(other) => Err(format!("`{name}` has wrong type: {other}")),
    }
}

/// Accepts `"12.5"`, `"+12.5%"`, `"-3 %"`; blank and `n/a` read as null.
fn parse_numeric_string(raw: &str) -> Option<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("null")
    {
        return Some(None);
    }
    let number = trimmed.trim_end_matches('%').trim_end();
    let number = number.strip_prefix('+').unwrap_or(number);
    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
}

fn read_events(object: &Map<String, Value>) -> Result<(BTreeSet<EventTag>, Vec<String>), String> {
    let Some(raw) = object.get("events") else {
        return Err("missing key `events`".to_string());
    };
    let Value::Array(items) = raw else {
        return Err(format!("`events` is not an array: {raw}"));
    };

    let mut events = BTreeSet::new();
    let mut dropped = Vec::new();
    for item in items {
        let Value::String(label) = item else {
            return Err(format!("`events` entry is not a string: {item}"));
        };
        match EventTag::from_label(label) {
            Some(tag) => {
                events.insert(tag);
            }
            None => dropped.push(label.clone()),
        }
    }
    Ok((events, dropped))
}

fn read_outlook(object: &Map<String, Value>) -> Result<Outlook, String> {
    let raw = object
        .get("prospects")
        .or_else(|| object.get("outlook"))
        .ok_or_else(|| "missing key `prospects`".to_string())?;
    let Value::String(label) = raw else {
        return Err(format!("`prospects` is not a string: {raw}"));
    };
    Outlook::from_label(label).ok_or_else(|| format!("unrecognized outlook {label:?}"))
}

/// Removes a leading reasoning block and Markdown code fences around the JSON.
fn strip_wrappers(content: &str) -> &str {
    let mut text = content.trim();
    if text.starts_with("<think>")
        && let Some(end) = text.find("</think>")
    {
        text = text[end + "</think>".len()..].trim();
    }
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    text
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
