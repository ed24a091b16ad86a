//! Aggregate CSV for one run.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{PersistError, PersistTarget, ResultSink};
use crate::analyze::{MetricKey, StructuredRecord};
use crate::atomic::write_atomic;

/// Column order of the aggregate file.
pub const CSV_HEADER: [&str; 8] = [
    "identity",
    "companyLabel",
    "QoQRevenue",
    "YoYRevenue",
    "QoQProfit",
    "YoYProfit",
    "events",
    "outlook",
];

/// Collects every record of the run into one CSV file.
///
/// The file is rewritten in full on each persist, so after `persist` returns
/// the row is on disk even if the process dies before the run ends. The file
/// starts over with each new sink; earlier runs are not merged.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    rows: Vec<String>,
}

impl CsvSink {
    /// Creates a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    /// Output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn write_all_rows(&self) -> std::io::Result<()> {
        write_atomic(&self.path, |writer| {
            writeln!(writer, "{}", CSV_HEADER.join(","))?;
            for row in &self.rows {
                writeln!(writer, "{row}")?;
            }
            Ok(())
        })
    }
}

/// Formats one record as a CSV line (without the newline).
fn format_row(record: &StructuredRecord) -> String {
    let mut cells = Vec::with_capacity(CSV_HEADER.len());
    cells.push(escape_csv(&record.source_identity));
    cells.push(escape_csv(&record.company_label));
    for key in MetricKey::ALL {
        cells.push(record.metric(key).map(|v| v.to_string()).unwrap_or_default());
    }
    let events = record
        .events
        .iter()
        .map(|tag| tag.label())
        .collect::<Vec<_>>()
        .join("; ");
    cells.push(escape_csv(&events));
    cells.push(escape_csv(record.outlook.label()));
    cells.join(",")
}

/// Quotes a cell when it contains a delimiter, quote or line break.
#[must_use]
pub fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[async_trait]
impl ResultSink for CsvSink {
    #[instrument(skip(self, record), fields(identity = %record.source_identity, path = %self.path.display()))]
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError> {
        self.rows.push(format_row(record));
        if let Err(e) = self.write_all_rows() {
            self.rows.pop();
            return Err(PersistError::io(&self.path, e));
        }
        debug!(rows = self.rows.len(), "csv rewritten");
        Ok(PersistTarget::File(self.path.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;

    use super::*;
    use crate::analyze::{EventTag, Outlook};

    fn record(identity: &str, company: &str) -> StructuredRecord {
        StructuredRecord {
            source_identity: identity.to_string(),
            company_label: company.to_string(),
            source_url: "https://example.com/a.pdf".to_string(),
            metrics: BTreeMap::from([
                (MetricKey::QoqRevenue, Some(5.0)),
                (MetricKey::YoyRevenue, Some(12.5)),
                (MetricKey::QoqProfit, None),
                (MetricKey::YoyProfit, Some(-3.0)),
            ]),
            events: BTreeSet::from([EventTag::OrderWins, EventTag::Capex]),
            outlook: Outlook::Favorable,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_format_row_column_order() {
        let row = format_row(&record("acmeltd", "Acme, Ltd"));
        assert_eq!(
            row,
            "acmeltd,\"Acme, Ltd\",5,12.5,,-3,Order Wins; Capex,Favorable"
        );
    }

    #[tokio::test]
    async fn test_each_persist_rewrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvSink::new(&path);

        sink.persist(&record("acme", "Acme")).await.unwrap();
        let after_one = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after_one.lines().count(), 2);
        assert!(after_one.starts_with(
            "identity,companyLabel,QoQRevenue,YoYRevenue,QoQProfit,YoYProfit,events,outlook"
        ));

        sink.persist(&record("globex", "Globex")).await.unwrap();
        let after_two = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = after_two.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("acme,"));
        assert!(lines[2].starts_with("globex,"));
        assert_eq!(sink.row_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_drops_row() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut sink = CsvSink::new(blocker.join("results.csv"));

        assert!(sink.persist(&record("acme", "Acme")).await.is_err());
        assert_eq!(sink.row_count(), 0);
    }
}
