//! Remote result API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use super::{PersistError, PersistTarget, ResultSink};
use crate::analyze::{MetricKey, StructuredRecord};
use crate::http::{API_SINK_TIMEOUT, build_client};
use crate::user_agent::default_api_user_agent;

#[derive(Debug, Serialize)]
struct ApiPayload<'a> {
    company: &'a str,
    identity: &'a str,
    source_url: &'a str,
    #[serde(flatten)]
    metrics: &'a BTreeMap<MetricKey, Option<f64>>,
    events: Vec<&'static str>,
    outlook: &'static str,
    extracted_at: String,
}

impl<'a> ApiPayload<'a> {
    fn from_record(record: &'a StructuredRecord) -> Self {
        Self {
            company: &record.company_label,
            identity: &record.source_identity,
            source_url: &record.source_url,
            metrics: &record.metrics,
            events: record.events.iter().map(|tag| tag.label()).collect(),
            outlook: record.outlook.label(),
            extracted_at: record.extracted_at.to_rfc3339(),
        }
    }
}

/// POSTs every record as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct ApiSink {
    client: Client,
    url: String,
    token: Option<String>,
}

impl ApiSink {
    /// Creates a sink posting to `url` with the 15 s timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(API_SINK_TIMEOUT, &default_api_user_agent(), None)?,
            url: url.into(),
            token: None,
        })
    }

    /// Sends `token` as a bearer credential.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl ResultSink for ApiSink {
    #[instrument(skip(self, record), fields(identity = %record.source_identity, url = %self.url))]
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&ApiPayload::from_record(record));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PersistError::http(&self.url, "request timed out")
            } else {
                PersistError::http(&self.url, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistError::http_status(&self.url, status.as_u16()));
        }

        info!(status = status.as_u16(), "record posted");
        Ok(PersistTarget::Remote(self.url.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::analyze::{EventTag, Outlook};

    #[test]
    fn test_payload_flattens_metrics() {
        let record = StructuredRecord {
            source_identity: "acme".to_string(),
            company_label: "Acme".to_string(),
            source_url: "https://example.com/a.pdf".to_string(),
            metrics: BTreeMap::from([
                (MetricKey::QoqRevenue, Some(5.0)),
                (MetricKey::YoyProfit, None),
            ]),
            events: BTreeSet::from([EventTag::Demerger]),
            outlook: Outlook::Challenging,
            extracted_at: Utc::now(),
        };
        let json = serde_json::to_value(ApiPayload::from_record(&record)).unwrap();
        assert_eq!(json["company"], "Acme");
        assert_eq!(json["QoQRevenue"], 5.0);
        assert!(json["YoYProfit"].is_null());
        assert_eq!(json["events"], serde_json::json!(["Demerger"]));
        assert_eq!(json["outlook"], "Challenging");
    }
}
