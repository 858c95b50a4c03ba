//! Post acquisition: the `PostSource` seam and the Reddit listing client.
//!
//! The public JSON listing endpoints return HTML-entity-encoded text, so
//! decoding happens here at the boundary. Everything downstream works on
//! plain text and stays idempotent.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::NarratorError;
use crate::post::Post;

pub const MAX_FETCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }

    /// Unknown values fall back to `Hot`, matching the service's lenient
    /// query-parameter handling.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "new" => SortMode::New,
            "top" => SortMode::Top,
            "rising" => SortMode::Rising,
            "hot" => SortMode::Hot,
            other => {
                tracing::warn!(sort = other, "unknown sort mode, defaulting to hot");
                SortMode::Hot
            }
        }
    }
}

/// Where posts come from. `fetch_single_post` distinguishes "no such post"
/// (`Ok(None)`) from a transient fetch failure (`Err`).
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_posts(
        &self,
        channel: &str,
        sort: SortMode,
        limit: usize,
    ) -> Result<Vec<Post>, NarratorError>;

    async fn fetch_single_post(&self, post_id: &str) -> Result<Option<Post>, NarratorError>;

    async fn validate_channel(&self, channel: &str) -> Result<bool, NarratorError>;
}

pub struct RedditClient {
    client: Client,
    base_url: String,
}

impl RedditClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, NarratorError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| NarratorError::Engine(format!("building reddit client: {e}")))?;
        Ok(Self {
            client,
            base_url: "https://www.reddit.com".into(),
        })
    }

    async fn get_listing(&self, url: &str) -> Result<Vec<Post>, NarratorError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NarratorError::Engine(format!("reddit request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NarratorError::Engine(format!(
                "reddit returned {status} for {url}"
            )));
        }
        let listing: Listing = response
            .json()
            .await
            .map_err(|e| NarratorError::Engine(format!("parsing reddit listing: {e}")))?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into_post())
            .collect())
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_posts(
        &self,
        channel: &str,
        sort: SortMode,
        limit: usize,
    ) -> Result<Vec<Post>, NarratorError> {
        let limit = limit.min(MAX_FETCH_LIMIT);
        let url = format!(
            "{}/r/{}/{}.json?limit={}",
            self.base_url,
            channel,
            sort.as_str(),
            limit
        );
        tracing::info!(channel, sort = sort.as_str(), limit, "fetching posts");
        let posts = self.get_listing(&url).await?;
        tracing::info!(channel, fetched = posts.len(), "posts fetched");
        Ok(posts)
    }

    async fn fetch_single_post(&self, post_id: &str) -> Result<Option<Post>, NarratorError> {
        let url = format!("{}/api/info.json?id=t3_{}", self.base_url, post_id);
        let posts = self.get_listing(&url).await?;
        Ok(posts.into_iter().next())
    }

    async fn validate_channel(&self, channel: &str) -> Result<bool, NarratorError> {
        let url = format!("{}/r/{}/about.json", self.base_url, channel);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NarratorError::Engine(format!("reddit request failed: {e}")))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                tracing::warn!(channel, "channel missing or private");
                Ok(false)
            }
            s => Err(NarratorError::Engine(format!("reddit returned {s} for {url}"))),
        }
    }
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: RawPost,
}

/// Wire shape of one submission in a listing. Absent authors come back as
/// null; the listing text is HTML-entity encoded.
#[derive(Deserialize)]
struct RawPost {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    subreddit: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    over_18: bool,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: String,
}

impl RawPost {
    fn into_post(self) -> Post {
        Post {
            id: self.id,
            title: decode_entities(&self.title),
            body: decode_entities(&self.selftext),
            author: self.author.unwrap_or_else(|| "[deleted]".into()),
            subreddit: self.subreddit,
            score: self.score,
            comment_count: self.num_comments,
            created_at: epoch_to_datetime(self.created_utc),
            is_self_text: self.is_self,
            is_video: self.is_video,
            is_adult_flagged: self.over_18,
            permalink: format!("https://reddit.com{}", self.permalink),
            url: self.url,
        }
    }
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

fn epoch_to_datetime(epoch: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Canned in-memory source for tests and offline runs.
#[derive(Default)]
pub struct StaticSource {
    posts: Vec<Post>,
}

impl StaticSource {
    pub fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl PostSource for StaticSource {
    async fn fetch_posts(
        &self,
        channel: &str,
        _sort: SortMode,
        limit: usize,
    ) -> Result<Vec<Post>, NarratorError> {
        Ok(self
            .posts
            .iter()
            .filter(|p| p.subreddit.eq_ignore_ascii_case(channel))
            .take(limit.min(MAX_FETCH_LIMIT))
            .cloned()
            .collect())
    }

    async fn fetch_single_post(&self, post_id: &str) -> Result<Option<Post>, NarratorError> {
        Ok(self.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn validate_channel(&self, channel: &str) -> Result<bool, NarratorError> {
        Ok(self
            .posts
            .iter()
            .any(|p| p.subreddit.eq_ignore_ascii_case(channel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_mode_parses_leniently() {
        assert_eq!(SortMode::parse_lenient("top"), SortMode::Top);
        assert_eq!(SortMode::parse_lenient("bogus"), SortMode::Hot);
    }

    #[test]
    fn raw_post_decodes_entities_and_defaults_author() {
        let raw: RawPost = serde_json::from_str(
            r#"{
                "id": "abc",
                "title": "Ben &amp; Jerry",
                "selftext": "it&#39;s fine",
                "author": null,
                "subreddit": "test",
                "created_utc": 1714000000.0,
                "permalink": "/r/test/comments/abc/x/"
            }"#,
        )
        .unwrap();
        let post = raw.into_post();
        assert_eq!(post.title, "Ben & Jerry");
        assert_eq!(post.body, "it's fine");
        assert_eq!(post.author, "[deleted]");
        assert!(post.permalink.starts_with("https://reddit.com/r/test"));
    }

    #[tokio::test]
    async fn static_source_filters_by_channel() {
        let mut p = crate::post::Post {
            id: "p1".into(),
            title: "t".into(),
            body: "b".into(),
            author: "a".into(),
            subreddit: "Stories".into(),
            score: 1,
            comment_count: 0,
            created_at: Utc::now(),
            is_self_text: true,
            is_video: false,
            is_adult_flagged: false,
            permalink: String::new(),
            url: String::new(),
        };
        let mut other = p.clone();
        other.id = "p2".into();
        other.subreddit = "rust".into();
        p.id = "p1".into();

        let source = StaticSource::new(vec![p, other]);
        let posts = source.fetch_posts("stories", SortMode::Hot, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "p1");
        assert!(source.validate_channel("RUST").await.unwrap());
        assert!(source.fetch_single_post("p2").await.unwrap().is_some());
        assert!(source.fetch_single_post("nope").await.unwrap().is_none());
    }
}
