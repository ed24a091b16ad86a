//! Document (PDF) extraction: fetch, stage in a scratch file, decode to text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::error::ExtractError;
use crate::http::{DOCUMENT_TIMEOUT, build_client};
use crate::user_agent::BROWSER_USER_AGENT;

/// Magic bytes at the start of every PDF.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Content types accepted without inspecting the body.
const DOCUMENT_CONTENT_TYPES: [&str; 2] = ["application/pdf", "application/x-pdf"];

/// Content types that may carry a PDF and are accepted after sniffing the body.
const SNIFFED_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "binary/octet-stream"];

/// Turns a document file into plain text.
///
/// Decoding is delegated to an external capability; implementations run on a
/// blocking thread and receive a seekable file path.
pub trait DocumentDecoder: Send + Sync {
    /// Decodes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the bytes are not a decodable document.
    fn decode(&self, path: &Path) -> Result<String, String>;
}

/// PDF decoder backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfDecoder;

impl DocumentDecoder for PdfDecoder {
    fn decode(&self, path: &Path) -> Result<String, String> {
        pdf_extract::extract_text(path).map_err(|e| e.to_string())
    }
}

/// Outcome of checking the response content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentTypeCheck {
    /// Declared as a document.
    Document,
    /// Generic binary or missing; the body must start with the PDF magic.
    Sniff,
    /// Declared as something else (HTML login page, JSON error, ...).
    Rejected,
}

fn check_content_type(header: Option<&str>) -> ContentTypeCheck {
    let Some(raw) = header else {
        return ContentTypeCheck::Sniff;
    };
    let mime = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if DOCUMENT_CONTENT_TYPES.contains(&mime.as_str()) {
        ContentTypeCheck::Document
    } else if mime.is_empty() || SNIFFED_CONTENT_TYPES.contains(&mime.as_str()) {
        ContentTypeCheck::Sniff
    } else {
        ContentTypeCheck::Rejected
    }
}

/// Fetches documents over HTTP and decodes them to text.
///
/// Each call stages the body in a fresh scratch file that is removed when the
/// call returns, whether decoding succeeded or not.
#[derive(Clone)]
pub struct DocumentExtractor {
    client: Client,
    scratch_dir: Option<PathBuf>,
    decoder: Arc<dyn DocumentDecoder>,
}

impl std::fmt::Debug for DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExtractor")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl DocumentExtractor {
    /// Creates an extractor with the PDF decoder and the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(DOCUMENT_TIMEOUT, BROWSER_USER_AGENT, None)?,
            scratch_dir: None,
            decoder: Arc::new(PdfDecoder),
        })
    }

    /// Stages scratch files under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Replaces the decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn DocumentDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Fetches `url` and returns the decoded, non-empty text.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::Fetch`] on transport errors, timeouts, non-2xx
    ///   statuses and non-document content types
    /// - [`ExtractError::Format`] when the bytes do not decode
    /// - [`ExtractError::EmptyContent`] when decoding yields no text
    #[instrument(skip(self), fields(url = %url))]
    pub async fn extract_text(&self, url: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::http_status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let check = check_content_type(content_type.as_deref());
        if check == ContentTypeCheck::Rejected {
            return Err(ExtractError::fetch(
                url,
                format!(
                    "non-document content type {}",
                    content_type.unwrap_or_default()
                ),
            ));
        }

        let scratch = self.scratch_file()?;
        let scratch_path = scratch.path().to_path_buf();
        let (bytes_written, head) = stream_to_file(&scratch_path, response, url).await?;
        debug!(bytes = bytes_written, path = %scratch_path.display(), "document staged");

        if !head.starts_with(PDF_MAGIC) {
            return Err(match check {
                ContentTypeCheck::Sniff => {
                    ExtractError::fetch(url, "response body is not a PDF document")
                }
                _ => ExtractError::format(url, "missing PDF header"),
            });
        }

        let decoder = Arc::clone(&self.decoder);
        let decode_path = scratch_path.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&decode_path))
            .await
            .map_err(|e| ExtractError::format(url, format!("decoder aborted: {e}")))?
            .map_err(|reason| ExtractError::format(url, reason))?;

        // Scratch file is deleted here, before the text leaves this function.
        drop(scratch);

        if decoded.trim().is_empty() {
            return Err(ExtractError::empty(url));
        }

        info!(chars = decoded.chars().count(), "document decoded");
        Ok(decoded)
    }

    fn scratch_file(&self) -> Result<NamedTempFile, ExtractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("concall-").suffix(".pdf");
        match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| ExtractError::io(dir.clone(), e))?;
                builder
                    .tempfile_in(dir)
                    .map_err(|e| ExtractError::io(dir.clone(), e))
            }
            None => builder
                .tempfile()
                .map_err(|e| ExtractError::io(std::env::temp_dir(), e)),
        }
    }
}

/// Streams the response body into `path`, returning the byte count and the
/// first bytes of the body for format sniffing.
async fn stream_to_file(
    path: &Path,
    response: reqwest::Response,
    url: &str,
) -> Result<(u64, Vec<u8>), ExtractError> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ExtractError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;
    let mut head: Vec<u8> = Vec::with_capacity(PDF_MAGIC.len());

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ExtractError::from_reqwest(url, &e))?;

        if head.len() < PDF_MAGIC.len() {
            let take = (PDF_MAGIC.len() - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ExtractError::io(path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| ExtractError::io(path, e))?;

    Ok((bytes_written, head))
}
