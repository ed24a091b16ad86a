//! Shared fakes for pipeline-level tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concall_core::analyze::validate_response;
use concall_core::{
    AnalyzeError, ContentExtractor, ExtractError, PersistError, PersistTarget, RawContent,
    ResultSink, SourceDescriptor, StructuredAnalyzer, StructuredRecord,
};
use url::Url;

/// A model reply that passes validation.
pub const GOOD_REPLY: &str = r#"{"QoQRevenue": 5, "YoYRevenue": 12, "QoQProfit": -2, "YoYProfit": 8, "events": ["Order Wins", "UnknownTag"], "prospects": "Good"}"#;

pub fn source(company: &str) -> SourceDescriptor {
    let slug: String = company
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let url = Url::parse(&format!("https://example.com/{slug}.pdf")).unwrap();
    SourceDescriptor::new(company, url)
}

/// Extractor returning canned text per identity; unknown identities fail.
#[derive(Default)]
pub struct FakeExtractor {
    texts: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn with_text(mut self, identity: &str, text: &str) -> Self {
        self.texts.insert(identity.to_string(), text.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<RawContent, ExtractError> {
        self.calls
            .lock()
            .unwrap()
            .push(source.identity().to_string());
        match self.texts.get(source.identity()) {
            Some(text) => Ok(RawContent::new(source.identity(), text.as_str())),
            None => Err(ExtractError::http_status(source.locator().as_str(), 404)),
        }
    }
}

/// Analyzer that fails its first `failures` attempts, then validates `reply`.
pub struct ScriptedAnalyzer {
    reply: String,
    failures: u32,
    pub attempts: AtomicU32,
    pub seen_lengths: Mutex<Vec<usize>>,
}

impl ScriptedAnalyzer {
    pub fn new(reply: &str) -> Self {
        Self::failing_first(reply, 0)
    }

    pub fn failing_first(reply: &str, failures: u32) -> Self {
        Self {
            reply: reply.to_string(),
            failures,
            attempts: AtomicU32::new(0),
            seen_lengths: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(GOOD_REPLY, u32::MAX)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredAnalyzer for ScriptedAnalyzer {
    async fn try_analyze(
        &self,
        source: &SourceDescriptor,
        content: &RawContent,
    ) -> Result<StructuredRecord, AnalyzeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_lengths.lock().unwrap().push(content.length);
        if attempt <= self.failures {
            return Err(AnalyzeError::transport("connection reset"));
        }
        let analysis = validate_response(&self.reply).map_err(AnalyzeError::schema)?;
        Ok(StructuredRecord::from_analysis(source, analysis))
    }
}

/// Sink collecting records in memory, optionally rejecting some identities.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub records: Arc<Mutex<Vec<StructuredRecord>>>,
    reject: Vec<String>,
}

impl MemorySink {
    pub fn rejecting(identity: &str) -> Self {
        Self {
            records: Arc::default(),
            reject: vec![identity.to_string()],
        }
    }

    pub fn identities(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.source_identity.clone())
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError> {
        if self.reject.contains(&record.source_identity) {
            return Err(PersistError::http("memory://sink", "rejected"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(PersistTarget::Remote("memory://sink".to_string()))
    }
}
