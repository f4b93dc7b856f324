/// X API Module
///
/// The five platform operations the bot depends on, behind the `XApi` trait,
/// and `XClient`, their implementation over the X API v2.
/// According to X API docs: https://docs.x.com/x-api/introduction

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Credentials};
use crate::error::ApiError;
use crate::oauth;
use crate::post::{parse_timestamp, Metrics, Post};

const TWEET_FIELDS: &str = "public_metrics,created_at,author_id";

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[async_trait]
pub trait XApi: Send + Sync {
    /// The account the credentials belong to
    async fn get_me(&self) -> Result<Account, ApiError>;

    /// Home timeline of `user_id`, without reposts and replies
    async fn home_timeline(&self, user_id: &str, max_results: u32) -> Result<Vec<Post>, ApiError>;

    /// Recent posts matching `query`
    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<Post>, ApiError>;

    async fn like(&self, user_id: &str, post_id: &str) -> Result<(), ApiError>;

    async fn repost(&self, user_id: &str, post_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct TweetWire {
    id: String,
    text: Option<String>,
    author_id: Option<String>,
    created_at: Option<String>,
    public_metrics: Option<MetricsWire>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricsWire {
    like_count: Option<u64>,
    retweet_count: Option<u64>,
    reply_count: Option<u64>,
    quote_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    data: Option<Vec<TweetWire>>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: Account,
}

#[derive(Debug, Serialize)]
struct TargetTweet<'a> {
    tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct LikeResponse {
    data: LikeData,
}

#[derive(Debug, Deserialize)]
struct LikeData {
    liked: bool,
}

#[derive(Debug, Deserialize)]
struct RetweetResponse {
    data: RetweetData,
}

#[derive(Debug, Deserialize)]
struct RetweetData {
    retweeted: bool,
}

impl From<TweetWire> for Post {
    fn from(wire: TweetWire) -> Self {
        let metrics = wire.public_metrics.unwrap_or_default();
        Post {
            id: wire.id,
            author_id: wire.author_id,
            text: wire.text,
            created_at: parse_timestamp(wire.created_at.as_deref()),
            metrics: Metrics {
                like_count: metrics.like_count.unwrap_or(0),
                retweet_count: metrics.retweet_count.unwrap_or(0),
                reply_count: metrics.reply_count.unwrap_or(0),
                quote_count: metrics.quote_count.unwrap_or(0),
            },
        }
    }
}

fn into_posts(response: TweetsResponse) -> Vec<Post> {
    response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(Post::from)
        .collect()
}

/// Map a non-success HTTP response onto an error kind
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ApiError {
    match status.as_u16() {
        429 => ApiError::RateLimited {
            reset_at: rate_limit_reset(headers),
        },
        401 => ApiError::Unauthorized(body.to_string()),
        403 if body.to_ascii_lowercase().contains("already") => {
            ApiError::AlreadyDone(body.to_string())
        }
        403 => ApiError::Forbidden(body.to_string()),
        500..=599 => ApiError::Transient(format!("{} - {}", status, body)),
        code => ApiError::Rejected {
            status: code,
            body: body.to_string(),
        },
    }
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-rate-limit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
}

fn rate_limit_remaining(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-rate-limit-remaining")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())
}

/// X API v2 client
///
/// Uses OAuth 1.0a user context for account-scoped calls and the
/// app-only Bearer Token for search.
pub struct XClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl XClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.http_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            credentials: config.credentials.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request signed for the authenticated account
    fn user_request(&self, method: Method, path: &str, query: &[(&str, String)]) -> RequestBuilder {
        let url = self.url(path);
        let auth = oauth::authorization_header(&self.credentials, method.as_str(), &url, query);
        self.http
            .request(method, &url)
            .header("Authorization", auth)
            .query(query)
    }

    /// Request authenticated with the app-only Bearer Token
    fn app_request(&self, path: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.bearer_token.trim()),
            )
            .query(query)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();

        if let Some(remaining) = rate_limit_remaining(&headers) {
            log::debug!("X API rate limit: {} requests remaining", remaining);
            if remaining < 5 {
                log::warn!("Low rate limit remaining on this endpoint ({} left)", remaining);
            }
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &text));
        }

        response.json::<T>().await.map_err(ApiError::from)
    }
}

/// Recent search ranked by relevancy, so the most engaged posts come first
fn search_params(query: &str, max_results: u32) -> [(&'static str, String); 4] {
    [
        ("query", query.to_string()),
        ("max_results", max_results.to_string()),
        ("sort_order", "relevancy".to_string()),
        ("tweet.fields", TWEET_FIELDS.to_string()),
    ]
}

#[async_trait]
impl XApi for XClient {
    async fn get_me(&self) -> Result<Account, ApiError> {
        let request = self.user_request(Method::GET, "/2/users/me", &[]);
        let me: MeResponse = self.send(request).await?;
        Ok(me.data)
    }

    async fn home_timeline(&self, user_id: &str, max_results: u32) -> Result<Vec<Post>, ApiError> {
        let path = format!("/2/users/{}/timelines/reverse_chronological", user_id);
        let query = [
            ("exclude", "retweets,replies".to_string()),
            ("max_results", max_results.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        log::debug!("Fetching home timeline (max: {})", max_results);

        let request = self.user_request(Method::GET, &path, &query);
        let response: TweetsResponse = self.send(request).await?;
        Ok(into_posts(response))
    }

    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<Post>, ApiError> {
        let params = search_params(query, max_results);
        log::debug!("Searching recent posts with query: {} (max: {})", query, max_results);

        let request = self.app_request("/2/tweets/search/recent", &params);
        let response: TweetsResponse = self.send(request).await?;
        Ok(into_posts(response))
    }

    async fn like(&self, user_id: &str, post_id: &str) -> Result<(), ApiError> {
        let path = format!("/2/users/{}/likes", user_id);
        let request = self
            .user_request(Method::POST, &path, &[])
            .json(&TargetTweet { tweet_id: post_id });
        let response: LikeResponse = self.send(request).await?;

        if response.data.liked {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("like of {} was not applied", post_id)))
        }
    }

    async fn repost(&self, user_id: &str, post_id: &str) -> Result<(), ApiError> {
        let path = format!("/2/users/{}/retweets", user_id);
        let request = self
            .user_request(Method::POST, &path, &[])
            .json(&TargetTweet { tweet_id: post_id });
        let response: RetweetResponse = self.send(request).await?;

        if response.data.retweeted {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("repost of {} was not applied", post_id)))
        }
    }
}
