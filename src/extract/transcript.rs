//! Timed-transcript extraction for recorded calls on video platforms.
//!
//! The locator only has to carry an 11-character video id; the provider turns
//! that id into ordered caption segments, which are joined one per line.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::error::ExtractError;
use crate::http::{TRANSCRIPT_TIMEOUT, build_client};
use crate::user_agent::BROWSER_USER_AGENT;

/// Default provider origin.
pub const DEFAULT_TRANSCRIPT_BASE_URL: &str = "https://www.youtube.com";

/// Default preferred caption language.
pub const DEFAULT_TRANSCRIPT_LANGUAGE: &str = "en";

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex")
});

static TIMED_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").expect("valid timed text regex")
});

static XML_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"&#(x[0-9A-Fa-f]+|[0-9]+);").expect("valid entity regex")
});

/// One caption cue.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Caption text, entity-decoded.
    pub text: String,
    /// Offset from the start of the video in seconds.
    pub start_secs: f64,
    /// Cue duration in seconds.
    pub duration_secs: f64,
}

/// Source of timed transcripts keyed by video id.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Returns the caption segments for `video_id`.
    ///
    /// # Errors
    ///
    /// [`ExtractError::TranscriptUnavailable`] when the video has no caption
    /// track, [`ExtractError::Fetch`] on transport failures.
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, ExtractError>;
}

/// Extracts the video id from a locator.
///
/// Looks at the `v=` query parameter first, then the last non-empty path
/// segment (`youtu.be/<id>`, `/embed/<id>`, `/shorts/<id>`, `/live/<id>`).
#[must_use]
pub fn parse_video_id(locator: &Url) -> Option<String> {
    if let Some((_, value)) = locator.query_pairs().find(|(key, _)| key == "v")
        && VIDEO_ID_RE.is_match(&value)
    {
        return Some(value.into_owned());
    }

    locator
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .filter(|segment| VIDEO_ID_RE.is_match(segment))
        .map(str::to_string)
}

/// Orders segments chronologically and joins their texts with newlines.
#[must_use]
pub fn join_segments(mut segments: Vec<TranscriptSegment>) -> String {
    segments.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    segments
        .into_iter()
        .map(|segment| segment.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Transcript extraction strategy.
#[derive(Clone)]
pub struct TranscriptExtractor {
    provider: Arc<dyn TranscriptProvider>,
}

impl std::fmt::Debug for TranscriptExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptExtractor").finish_non_exhaustive()
    }
}

impl TranscriptExtractor {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn TranscriptProvider>) -> Self {
        Self { provider }
    }

    /// Resolves the locator's transcript into newline-joined text.
    ///
    /// # Errors
    ///
    /// [`ExtractError::Identifier`] when no id is found, otherwise whatever the
    /// provider reports. Zero segments is [`ExtractError::TranscriptUnavailable`].
    #[instrument(skip(self), fields(url = %locator))]
    pub async fn extract_text(&self, locator: &Url) -> Result<String, ExtractError> {
        let video_id =
            parse_video_id(locator).ok_or_else(|| ExtractError::identifier(locator.as_str()))?;
        debug!(%video_id, "resolved video id");

        let segments = self.provider.fetch_segments(&video_id).await?;
        if segments.is_empty() {
            return Err(ExtractError::transcript_unavailable(video_id));
        }

        let count = segments.len();
        let text = join_segments(segments);
        info!(%video_id, segments = count, "transcript fetched");
        Ok(text)
    }
}

/// Caption track entry embedded in the watch page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
}

/// Transcript provider that reads caption tracks from the YouTube watch page.
#[derive(Debug, Clone)]
pub struct YoutubeTranscripts {
    client: Client,
    base_url: String,
    language: String,
}

impl YoutubeTranscripts {
    /// Creates a provider against the public site, preferring English captions.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEFAULT_TRANSCRIPT_BASE_URL)
    }

    /// Creates a provider against a different origin.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(TRANSCRIPT_TIMEOUT, BROWSER_USER_AGENT, None)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: DEFAULT_TRANSCRIPT_LANGUAGE.to_string(),
        })
    }

    /// Sets the preferred caption language code.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ExtractError::from_reqwest(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::http_status(url, status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| ExtractError::from_reqwest(url, &e))
    }

    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        tracks
            .iter()
            .find(|t| t.language_code == self.language)
            .or_else(|| {
                tracks
                    .iter()
                    .find(|t| t.language_code.starts_with(&self.language))
            })
            .or_else(|| tracks.first())
    }
}

#[async_trait]
impl TranscriptProvider for YoutubeTranscripts {
    #[instrument(skip(self))]
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, ExtractError> {
        let watch_url = format!("{}/watch?v={video_id}", self.base_url);
        let page = self.get_text(&watch_url).await?;

        let Some(tracks_json) = caption_tracks_json(&page) else {
            debug!("watch page has no caption tracks");
            return Err(ExtractError::transcript_unavailable(video_id));
        };
        let tracks: Vec<CaptionTrack> = serde_json::from_str(tracks_json)
            .map_err(|e| ExtractError::fetch(&watch_url, format!("malformed caption list: {e}")))?;
        let Some(track) = self.pick_track(&tracks) else {
            return Err(ExtractError::transcript_unavailable(video_id));
        };
        debug!(language = %track.language_code, "selected caption track");

        let xml = self.get_text(&track.base_url).await?;
        Ok(parse_timed_text(&xml))
    }
}

/// Finds the JSON array following `"captionTracks":` in the watch page.
///
/// The array holds nested objects and arrays, so the end is found by bracket
/// depth while skipping string contents.
fn caption_tracks_json(page: &str) -> Option<&str> {
    const MARKER: &str = "\"captionTracks\":";
    let start = page.find(MARKER)? + MARKER.len();
    let rest = &page[start..];
    let open = rest.find('[')?;
    if !rest[..open].trim().is_empty() {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in rest[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&rest[open..=open + idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses timed-text XML (`<text start=".." dur="..">..</text>`) into segments.
///
/// Attributes may appear in any order and with either quote style. Cues
/// without a numeric `start` or with blank text are dropped.
fn parse_timed_text(xml: &str) -> Vec<TranscriptSegment> {
    TIMED_TEXT_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let start_secs = timed_text_attr(attrs, "start")?.parse::<f64>().ok()?;
            let duration_secs = timed_text_attr(attrs, "dur")
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            let text = decode_entities(caps.get(2)?.as_str()).trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                text,
                start_secs,
                duration_secs,
            })
        })
        .collect()
}

fn timed_text_attr<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    XML_ATTR_RE
        .captures_iter(attrs)
        .find(|caps| &caps[1] == name)
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
}

/// Decodes the XML entities found in caption text.
///
/// Caption payloads are frequently escaped twice (`&amp;#39;`), so `&amp;`
/// is unescaped before the other entities.
fn decode_entities(raw: &str) -> String {
    let once = raw.replace("&amp;", "&");
    let named = once
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");
    NUMERIC_ENTITY_RE
        .replace_all(&named, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let code = match body.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .replace('\n', " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_video_id_from_query() {
        let id = parse_video_id(&url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"));
        assert_eq!(id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_parse_video_id_from_path() {
        assert_eq!(
            parse_video_id(&url("https://youtu.be/dQw4w9WgXcQ")).as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            parse_video_id(&url("https://www.youtube.com/live/a_b-c1D2e3F/")).as_deref(),
            Some("a_b-c1D2e3F")
        );
    }

    #[test]
    fn test_parse_video_id_rejects_wrong_length() {
        assert_eq!(
            parse_video_id(&url("https://www.youtube.com/watch?v=short")),
            None
        );
        assert_eq!(parse_video_id(&url("https://example.com/report.pdf")), None);
        assert_eq!(parse_video_id(&url("https://youtu.be/")), None);
    }

    #[test]
    fn test_join_segments_orders_by_start() {
        let segments = vec![
            TranscriptSegment {
                text: "second".into(),
                start_secs: 5.0,
                duration_secs: 1.0,
            },
            TranscriptSegment {
                text: "first".into(),
                start_secs: 0.5,
                duration_secs: 1.0,
            },
        ];
        assert_eq!(join_segments(segments), "first\nsecond");
    }

    #[test]
    fn test_caption_tracks_json_handles_nested_brackets() {
        let page = r#"var x = {"captions":{"captionTracks":[{"baseUrl":"https://x/t?a=1&b=[2]","name":{"runs":[{"text":"English"}]},"languageCode":"en"}],"audioTracks":[]}};"#;
        let json = caption_tracks_json(page).unwrap();
        let tracks: Vec<CaptionTrack> = serde_json::from_str(json).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].base_url, "https://x/t?a=1&b=[2]");
        assert_eq!(tracks[0].language_code, "en");
    }

    #[test]
    fn test_caption_tracks_json_missing() {
        assert!(caption_tracks_json("<html>no captions here</html>").is_none());
    }

    #[test]
    fn test_parse_timed_text() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.0" dur="2.5">Good morning &amp; welcome</text><text start="2.5" dur="3">Revenue grew 12&#37;</text><text start="6" dur="1"> </text><text start="7.1">it&amp;#39;s done</text></transcript>"#;
        let segments = parse_timed_text(xml);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Good morning & welcome");
        assert_eq!(segments[1].text, "Revenue grew 12%");
        assert!((segments[1].duration_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(segments[2].text, "it's done");
        assert!((segments[2].duration_secs).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_timed_text_attributes_in_any_order() {
        let xml = r#"<transcript><text dur="1.5" start="3.0">later</text><text xml:lang='en' start='1.25'>earlier</text><text dur="2">no start</text></transcript>"#;
        let segments = parse_timed_text(xml);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "later");
        assert!((segments[0].start_secs - 3.0).abs() < f64::EPSILON);
        assert!((segments[0].duration_secs - 1.5).abs() < f64::EPSILON);
        assert_eq!(segments[1].text, "earlier");
        assert!((segments[1].start_secs - 1.25).abs() < f64::EPSILON);
    }
}
