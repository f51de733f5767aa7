//! Verse source: fetch one chapter as ordered (verse number, text) pairs over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use verse_core::{FetchError, Verse};

#[async_trait]
pub trait VerseSource: Send + Sync + 'static {
    async fn fetch(&self, book: &str, chapter: u16) -> Result<Vec<Verse>, FetchError>;
}

/// JSON passage API: `GET <base>?passage=<book chapter>&type=json`.
pub struct HttpVerseSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerseSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl VerseSource for HttpVerseSource {
    async fn fetch(&self, book: &str, chapter: u16) -> Result<Vec<Verse>, FetchError> {
        let passage = format!("{book} {chapter}");
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[("passage", passage.as_str()), ("type", "json")],
        )
        .map_err(|e| FetchError::Connect(e.to_string()))?;
        tracing::debug!(%url, "fetching verse data");
        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await.map_err(classify)?;
        parse_verses(&body)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_decode() || e.is_body() {
        FetchError::InvalidResponse(e.to_string())
    } else {
        FetchError::Connect(e.to_string())
    }
}

#[derive(Deserialize)]
struct RawVerse {
    verse: VerseNumber,
    text: String,
}

/// The API sends verse numbers as strings; accept plain numbers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum VerseNumber {
    Number(u32),
    Text(String),
}

/// Parse a passage response body into verses, keeping source order.
pub fn parse_verses(body: &str) -> Result<Vec<Verse>, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::InvalidResponse("empty body".into()));
    }
    let raw: Vec<RawVerse> =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    raw.into_iter()
        .map(|r| {
            let number = match r.verse {
                VerseNumber::Number(n) => n,
                VerseNumber::Text(s) => s.trim().parse().map_err(|_| {
                    FetchError::InvalidResponse(format!("bad verse number {s:?}"))
                })?,
            };
            Ok(Verse::new(number, r.text))
        })
        .collect()
}
