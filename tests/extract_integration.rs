//! Integration tests for document and transcript extraction.
//!
//! These tests run the extractors against mock HTTP servers. PDF decoding is
//! replaced by a stub so the HTTP and scratch-file handling can be checked
//! without shipping PDF fixtures.

use std::path::Path;
use std::sync::Arc;

use concall_core::extract::{
    ContentExtractor, DocumentDecoder, DocumentExtractor, ExtractError, SourceExtractor,
    TranscriptExtractor, YoutubeTranscripts,
};
use concall_core::{SourceDescriptor, SourceKind};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO_ID: &str = "dQw4w9WgXcQ";

/// Decoder that reports a fixed text and records the file it was given.
struct StubDecoder {
    text: String,
}

impl DocumentDecoder for StubDecoder {
    fn decode(&self, path: &Path) -> Result<String, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        if bytes.starts_with(b"%PDF-") && bytes.ends_with(b"%%EOF") {
            Ok(self.text.clone())
        } else {
            Err("truncated document".to_string())
        }
    }
}

fn stub(text: &str) -> Arc<dyn DocumentDecoder> {
    Arc::new(StubDecoder {
        text: text.to_string(),
    })
}

fn pdf_body() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << >> endobj\n%%EOF".to_vec()
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_document_extraction_decodes_and_cleans_scratch() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/q3.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(pdf_body()),
    )
    .await;
    let scratch = TempDir::new().expect("failed to create temp dir");

    let extractor = DocumentExtractor::new()
        .unwrap()
        .with_scratch_dir(scratch.path())
        .with_decoder(stub("Revenue grew 12% year on year."));
    let text = extractor
        .extract_text(&format!("{}/q3.pdf", server.uri()))
        .await
        .unwrap();

    assert_eq!(text, "Revenue grew 12% year on year.");
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch file should be removed");
}

#[tokio::test]
async fn test_document_octet_stream_is_sniffed() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/download",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/octet-stream")
            .set_body_bytes(pdf_body()),
    )
    .await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub("ok"));
    let text = extractor
        .extract_text(&format!("{}/download", server.uri()))
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_document_not_found_is_fetch_failure() {
    let server = MockServer::start().await;
    serve(&server, "/missing.pdf", ResponseTemplate::new(404)).await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub("unused"));
    let err = extractor
        .extract_text(&format!("{}/missing.pdf", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "fetch_failure");
    assert!(err.to_string().contains("404"), "got: {err}");
}

#[tokio::test]
async fn test_document_html_login_page_is_rejected() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/q3.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_string("<html><form>Please log in</form></html>"),
    )
    .await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub("unused"));
    let err = extractor
        .extract_text(&format!("{}/q3.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "fetch_failure");
}

#[tokio::test]
async fn test_document_garbage_bytes_are_format_failure() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/q3.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(b"\x00\x01 definitely not a pdf".to_vec()),
    )
    .await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub("unused"));
    let err = extractor
        .extract_text(&format!("{}/q3.pdf", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Format { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_document_truncated_pdf_is_format_failure() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/q3.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(b"%PDF-1.4\n1 0 obj".to_vec()),
    )
    .await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub("unused"));
    let err = extractor
        .extract_text(&format!("{}/q3.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "format_failure");
}

/// Decoder that crashes, as a native decoding library can on hostile input.
struct PanickingDecoder;

impl DocumentDecoder for PanickingDecoder {
    fn decode(&self, _path: &Path) -> Result<String, String> {
        panic!("decoder crashed on malformed xref table");
    }
}

#[tokio::test]
async fn test_document_decoder_panic_is_format_failure() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/q3.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(pdf_body()),
    )
    .await;
    let scratch = TempDir::new().expect("failed to create temp dir");

    let extractor = DocumentExtractor::new()
        .unwrap()
        .with_scratch_dir(scratch.path())
        .with_decoder(Arc::new(PanickingDecoder));
    let err = extractor
        .extract_text(&format!("{}/q3.pdf", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Format { .. }), "got: {err:?}");
    assert!(err.to_string().contains("decoder aborted"), "got: {err}");
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch file should be removed");
}

#[tokio::test]
async fn test_document_whitespace_text_is_empty_content() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/scan.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(pdf_body()),
    )
    .await;

    let extractor = DocumentExtractor::new().unwrap().with_decoder(stub(" \n\t "));
    let err = extractor
        .extract_text(&format!("{}/scan.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "empty_content");
}

async fn mount_watch_page(server: &MockServer, tracks: &str) {
    let page = format!(
        r#"<html><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{tracks},"audioTracks":[]}}}}}};</script></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", VIDEO_ID))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
}

fn transcript_source() -> SourceDescriptor {
    let locator = Url::parse(&format!("https://www.youtube.com/watch?v={VIDEO_ID}")).unwrap();
    SourceDescriptor::new("Globex", locator)
}

fn source_extractor(server: &MockServer) -> SourceExtractor {
    let provider = YoutubeTranscripts::with_base_url(server.uri())
        .unwrap()
        .with_language("en");
    SourceExtractor::new(
        DocumentExtractor::new().unwrap().with_decoder(stub("unused")),
        TranscriptExtractor::new(Arc::new(provider)),
    )
}

#[tokio::test]
async fn test_transcript_extraction_joins_segments_in_order() {
    let server = MockServer::start().await;
    let tracks = format!(
        r#"[{{"baseUrl":"{}/api/timedtext?v={VIDEO_ID}&lang=hi","languageCode":"hi"}},{{"baseUrl":"{}/api/timedtext?v={VIDEO_ID}&lang=en","languageCode":"en"}}]"#,
        server.uri(),
        server.uri()
    );
    mount_watch_page(&server, &tracks).await;
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<transcript><text start="4.2" dur="2">Margins expanded.</text><text start="0.0" dur="4.2">Good morning &amp; welcome</text></transcript>"#,
        ))
        .mount(&server)
        .await;

    let source = transcript_source();
    assert_eq!(source.kind(), SourceKind::Transcript);
    let content = source_extractor(&server).extract(&source).await.unwrap();

    assert_eq!(content.text, "Good morning & welcome\nMargins expanded.");
    assert_eq!(content.source_identity, "globex");
    assert_eq!(content.length, content.text.chars().count());
}

#[tokio::test]
async fn test_transcript_without_captions_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no captions</html>"))
        .mount(&server)
        .await;

    let err = source_extractor(&server)
        .extract(&transcript_source())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transcript_unavailable");
}

#[tokio::test]
async fn test_transcript_with_no_segments_is_unavailable() {
    let server = MockServer::start().await;
    let tracks = format!(
        r#"[{{"baseUrl":"{}/api/timedtext?v={VIDEO_ID}","languageCode":"en"}}]"#,
        server.uri()
    );
    mount_watch_page(&server, &tracks).await;
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<transcript></transcript>"))
        .mount(&server)
        .await;

    let err = source_extractor(&server)
        .extract(&transcript_source())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transcript_unavailable");
}

#[tokio::test]
async fn test_transcript_locator_without_video_id() {
    let server = MockServer::start().await;
    let locator = Url::parse("https://www.youtube.com/channel/").unwrap();
    let source = SourceDescriptor::with_kind("Globex", locator, SourceKind::Transcript);

    let err = source_extractor(&server).extract(&source).await.unwrap_err();
    assert_eq!(err.kind(), "identifier_failure");
}
