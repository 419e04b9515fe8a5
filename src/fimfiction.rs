use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::config::DataSource;
use crate::domain::{CompletionStatus, DownloadFormat, FIMFIC_BASE_URL, StoryId, StoryRecord};
use crate::error::TrackerError;

/// Anything able to turn a story id into its current metadata.
pub trait StorySource {
    fn fetch(&self, id: &StoryId) -> Result<StoryRecord, TrackerError>;
}

#[derive(Clone)]
pub struct FimfictionClient {
    client: Client,
    base_url: String,
    source: DataSource,
    format: DownloadFormat,
}

impl FimfictionClient {
    pub fn new(source: DataSource, format: DownloadFormat) -> Result<Self, TrackerError> {
        Self::with_base_url(FIMFIC_BASE_URL, source, format)
    }

    pub fn with_base_url(
        base_url: &str,
        source: DataSource,
        format: DownloadFormat,
    ) -> Result<Self, TrackerError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
            format,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/story.php", self.base_url)
    }

    fn story_url(&self, id: &StoryId) -> String {
        format!("{}/story/{}", self.base_url, id.as_str())
    }

    fn fetch_api(&self, id: &StoryId) -> Result<StoryRecord, TrackerError> {
        let url = self.api_url();
        tracing::debug!(%url, story = %id, "querying story api");
        let response = self
            .client
            .get(&url)
            .query(&[("story", id.as_str())])
            .send()
            .map_err(|err| TrackerError::Request(err.to_string()))?;
        let response = handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| TrackerError::Fetch(format!("story {id}: {err}")))?;
        parse_api_response(id, &body, &self.base_url)
    }

    fn fetch_page(&self, id: &StoryId) -> Result<StoryRecord, TrackerError> {
        let url = self.story_url(id);
        tracing::debug!(%url, story = %id, "fetching story page");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| TrackerError::Request(err.to_string()))?;
        let response = handle_status(response)?;
        let text = response
            .text()
            .map_err(|err| TrackerError::Request(err.to_string()))?;
        parse_story_page(id, &text, &self.base_url, self.format)
    }
}

impl StorySource for FimfictionClient {
    fn fetch(&self, id: &StoryId) -> Result<StoryRecord, TrackerError> {
        match self.source {
            DataSource::Api => self.fetch_api(id),
            DataSource::Html => self.fetch_page(id),
        }
    }
}

pub(crate) fn build_http_client() -> Result<Client, TrackerError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("fimfic-tracker/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| TrackerError::Request(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|err| TrackerError::Request(err.to_string()))
}

pub(crate) fn handle_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, TrackerError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(TrackerError::Status {
        url: response.url().to_string(),
        status: response.status().as_u16(),
    })
}

/// Normalizes a `story.php` API payload.
pub fn parse_api_response(
    id: &StoryId,
    body: &Value,
    base_url: &str,
) -> Result<StoryRecord, TrackerError> {
    if let Some(error) = body.get("error").and_then(|value| value.as_str()) {
        return Err(TrackerError::Fetch(format!("story {id}: {error}")));
    }
    let story = body
        .get("story")
        .ok_or_else(|| TrackerError::Fetch(format!("story {id}: missing \"story\" object")))?;

    let title = story
        .get("title")
        .and_then(|value| value.as_str())
        .ok_or_else(|| TrackerError::Fetch(format!("story {id}: missing title")))?
        .to_string();
    let author = story
        .get("author")
        .and_then(|value| value.get("name"))
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();
    let chapter_count = story
        .get("chapters")
        .and_then(|value| value.as_array())
        .map(|chapters| chapters.len() as u64)
        .or_else(|| story.get("chapter_count").and_then(|value| value.as_u64()))
        .ok_or_else(|| TrackerError::Fetch(format!("story {id}: missing chapters")))?;
    let words = story.get("words").and_then(|value| value.as_u64());
    let last_update_timestamp = story
        .get("date_modified")
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|v| v as i64)))
        .ok_or_else(|| TrackerError::Fetch(format!("story {id}: missing date_modified")))?;
    let completion_status = story
        .get("status")
        .and_then(|value| value.as_str())
        .map(CompletionStatus::from_marker)
        .unwrap_or(CompletionStatus::Unknown);

    Ok(StoryRecord {
        id: id.as_str().to_string(),
        title,
        author,
        url: format!("{base_url}/story/{}", id.as_str()),
        chapter_count,
        words,
        last_update_timestamp,
        completion_status,
        download_url: None,
    })
}

/// Extracts the same record from a story page.
pub fn parse_story_page(
    id: &StoryId,
    html: &str,
    base_url: &str,
    format: DownloadFormat,
) -> Result<StoryRecord, TrackerError> {
    let doc = Html::parse_document(html);

    let title = select_first(&doc, ".story_name")?
        .map(|el| collect_text(&el))
        .filter(|text| !text.is_empty())
        .ok_or_else(|| TrackerError::Fetch(format!("story {id}: no title on page")))?;
    let author = select_first(&doc, ".author a")?
        .map(|el| collect_text(&el))
        .unwrap_or_default();
    let chapter_count = select(&doc, "ul.chapters li .chapter_link")?.len() as u64;
    let last_update_timestamp = select(&doc, "ul.chapters [data-time]")?
        .iter()
        .filter_map(|el| el.value().attr("data-time"))
        .filter_map(|value| value.trim().parse::<i64>().ok())
        .max()
        .unwrap_or(0);
    let words = select_first(&doc, ".word_count b")?
        .map(|el| collect_text(&el).replace(',', ""))
        .and_then(|text| text.parse::<u64>().ok());
    let completion_status = select_first(&doc, r#"[class*="completed-status-"]"#)?
        .and_then(|el| {
            el.value()
                .classes()
                .find(|class| class.starts_with("completed-status-"))
                .map(CompletionStatus::from_marker)
        })
        .unwrap_or(CompletionStatus::Unknown);

    let suffix = format!("/{}", format.extension());
    let download_url = select(&doc, r#"a[href*="/story/download/"]"#)?
        .iter()
        .filter_map(|el| el.value().attr("href"))
        .find(|href| href.trim_end_matches('/').ends_with(&suffix))
        .map(|href| absolute_url(href, base_url));

    Ok(StoryRecord {
        id: id.as_str().to_string(),
        title,
        author,
        url: format!("{base_url}/story/{}", id.as_str()),
        chapter_count,
        words,
        last_update_timestamp,
        completion_status,
        download_url,
    })
}

fn selector(selector: &str) -> Result<Selector, TrackerError> {
    Selector::parse(selector)
        .map_err(|err| TrackerError::Fetch(format!("failed to compile selector {selector}: {err}")))
}

fn select<'a>(doc: &'a Html, selector_str: &str) -> Result<Vec<ElementRef<'a>>, TrackerError> {
    let selector = selector(selector_str)?;
    Ok(doc.select(&selector).collect())
}

fn select_first<'a>(doc: &'a Html, selector_str: &str) -> Result<Option<ElementRef<'a>>, TrackerError> {
    let selector = selector(selector_str)?;
    Ok(doc.select(&selector).next())
}

fn collect_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{base_url}{href}")
    } else {
        format!("{base_url}/{href}")
    }
}
