//! Media source reading a paginated JSON feed.
//!
//! `GET {feed_url}?limit=N[&cursor=C]` returns
//! `{ "items": [RawMediaItem...], "next_cursor": "..." }` and
//! `GET {feed_url}/items/{id}` returns one item, or 404 once it is gone.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use harvest_core::models::Media;
use harvest_core::{SourceError, SourceResultExt};

use crate::adapter::{FetchPage, MediaSourceAdapter, RawMediaItem, RefreshOutcome};

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    items: Vec<RawMediaItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Clone, Debug)]
pub struct JsonFeedAdapter {
    http_client: Client,
    feed_url: String,
    token: Option<String>,
}

impl JsonFeedAdapter {
    pub fn new(feed_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for JSON feed")?;

        Ok(Self {
            http_client,
            feed_url: feed_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.feed_url))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::fatal(anyhow!(
                "Feed {} rejected credentials: {}",
                self.feed_url,
                status
            )));
        }
        Ok(response)
    }
}

fn unexpected_status(url: &str, status: StatusCode) -> SourceError {
    SourceError::transient(anyhow!("Feed {} returned {}", url, status))
}

#[async_trait]
impl MediaSourceAdapter for JsonFeedAdapter {
    #[tracing::instrument(skip(self), fields(feed_url = %self.feed_url))]
    async fn fetch(&self, cursor: Option<&str>, page_size: u32) -> Result<FetchPage, SourceError> {
        let mut request = self
            .http_client
            .get(&self.feed_url)
            .query(&[("limit", page_size.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(unexpected_status(&self.feed_url, response.status()));
        }

        let page: FeedPage = response
            .json()
            .await
            .with_context(|| format!("Feed {} returned an unreadable page", self.feed_url))
            .fatal()?;

        tracing::debug!(items = page.items.len(), next_cursor = ?page.next_cursor, "Feed page fetched");
        Ok(FetchPage {
            items: page.items,
            next_cursor: page.next_cursor.filter(|c| !c.is_empty()),
        })
    }

    #[tracing::instrument(skip(self, media), fields(media_id = %media.id))]
    async fn refresh(&self, media: &Media) -> Result<RefreshOutcome, SourceError> {
        let url = format!("{}/items/{}", self.feed_url, media.id.media_id);
        let response = self.send(self.http_client.get(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(RefreshOutcome::NotFound),
            status if status.is_success() => {
                // one broken item must not stop the organization
                let item: RawMediaItem = response
                    .json()
                    .await
                    .with_context(|| format!("Feed item {} is unreadable", url))?;
                Ok(RefreshOutcome::Found(item))
            }
            status => Err(unexpected_status(&url, status)),
        }
    }
}
