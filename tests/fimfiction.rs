mod support;

use assert_matches::assert_matches;

use fimfic_tracker::config::DataSource;
use fimfic_tracker::domain::{CompletionStatus, DownloadFormat, StoryId};
use fimfic_tracker::error::TrackerError;
use fimfic_tracker::fimfiction::{FimfictionClient, StorySource};

use support::TestServer;

const API_BODY: &str = r#"{
  "story": {
    "id": 42,
    "title": "Twilight's Long Night",
    "author": {"id": 7, "name": "Sparkle"},
    "words": 54321,
    "date_modified": 1700000000,
    "status": "Incomplete",
    "chapters": [
      {"id": 1, "title": "One"},
      {"id": 2, "title": "Two"},
      {"id": 3, "title": "Three"},
      {"id": 4, "title": "Four"}
    ]
  }
}"#;

const STORY_PAGE: &str = r#"<!doctype html>
<html><body>
  <a class="story_name" href="/story/42/twilights-long-night">Twilight's Long Night</a>
  <span class="author"><a href="/user/7/sparkle">Sparkle</a></span>
  <span class="completed-status completed-status-complete">Complete</span>
  <ul class="chapters">
    <li><a class="chapter_link" href="/story/42/1">One</a><span data-time="1600000000"></span></li>
    <li><a class="chapter_link" href="/story/42/2">Two</a><span data-time="1700000000"></span></li>
  </ul>
  <div class="word_count"><b>2,000</b></div>
  <a href="/story/download/42/html">HTML</a>
  <a href="/story/download/42/txt">TXT</a>
</body></html>"#;

fn id(value: &str) -> StoryId {
    value.parse().unwrap()
}

#[test]
fn api_source_reads_story_metadata() {
    let server = TestServer::spawn(vec![(
        "/api/story.php?story=42",
        200,
        API_BODY.as_bytes().to_vec(),
    )]);
    let client =
        FimfictionClient::with_base_url(&server.base_url, DataSource::Api, DownloadFormat::Html)
            .unwrap();

    let record = client.fetch(&id("42")).unwrap();

    assert_eq!(record.id, "42");
    assert_eq!(record.title, "Twilight's Long Night");
    assert_eq!(record.author, "Sparkle");
    assert_eq!(record.chapter_count, 4);
    assert_eq!(record.words, Some(54321));
    assert_eq!(record.last_update_timestamp, 1_700_000_000);
    assert_eq!(record.completion_status, CompletionStatus::Incomplete);
    assert_eq!(record.url, format!("{}/story/42", server.base_url));
}

#[test]
fn api_error_payload_is_a_fetch_error() {
    let server = TestServer::spawn(vec![(
        "/api/story.php?story=9",
        200,
        br#"{"error": "Invalid story id"}"#.to_vec(),
    )]);
    let client =
        FimfictionClient::with_base_url(&server.base_url, DataSource::Api, DownloadFormat::Html)
            .unwrap();

    let err = client.fetch(&id("9")).unwrap_err();
    assert_matches!(err, TrackerError::Fetch(message) if message.contains("Invalid story id"));
}

#[test]
fn page_source_scrapes_story_page() {
    let server = TestServer::spawn(vec![("/story/42", 200, STORY_PAGE.as_bytes().to_vec())]);
    let client =
        FimfictionClient::with_base_url(&server.base_url, DataSource::Html, DownloadFormat::Txt)
            .unwrap();

    let record = client.fetch(&id("42")).unwrap();

    assert_eq!(record.chapter_count, 2);
    assert_eq!(record.words, Some(2000));
    assert_eq!(record.last_update_timestamp, 1_700_000_000);
    assert_eq!(record.completion_status, CompletionStatus::Complete);
    assert_eq!(
        record.download_url,
        Some(format!("{}/story/download/42/txt", server.base_url))
    );
}

#[test]
fn http_errors_carry_the_status() {
    let server = TestServer::spawn(Vec::new());
    let client =
        FimfictionClient::with_base_url(&server.base_url, DataSource::Html, DownloadFormat::Txt)
            .unwrap();

    let err = client.fetch(&id("1")).unwrap_err();
    assert_matches!(err, TrackerError::Status { status: 404, .. });
    assert!(err.is_request());
}
