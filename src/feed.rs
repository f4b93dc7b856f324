/// Feed Module
///
/// Collects candidate posts, either from the home timeline or from search.
/// A rate limit stops retrieval at once and hands back whatever was
/// collected so far. It never waits for the limit to clear.

use anyhow::{anyhow, Result};
use std::collections::HashSet;

use crate::config::{FeedConfig, SearchStrategy};
use crate::error::ApiError;
use crate::post::Post;
use crate::x_api::XApi;

/// Longest query the recent-search endpoint accepts
pub const MAX_QUERY_LEN: usize = 512;

const AUTHOR_QUERY_SUFFIX: &str = " -is:retweet -is:reply";

/// Posts gathered by one retrieval mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub posts: Vec<Post>,
    /// Retrieval stopped early on a rate limit
    pub rate_limited: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Append `other`, dropping posts whose id is already present
    pub fn extend(&mut self, other: Batch) {
        let mut seen: HashSet<String> = self.posts.iter().map(|p| p.id.clone()).collect();
        for post in other.posts {
            if seen.insert(post.id.clone()) {
                self.posts.push(post);
            }
        }
        self.rate_limited |= other.rate_limited;
    }
}

pub struct FeedSource<'a> {
    api: &'a dyn XApi,
    config: &'a FeedConfig,
}

/// Whether a failed query should end the whole search
enum QueryFailure {
    RateLimited,
    Skipped,
    Fatal(ApiError),
}

impl<'a> FeedSource<'a> {
    pub fn new(api: &'a dyn XApi, config: &'a FeedConfig) -> Self {
        Self { api, config }
    }

    /// Fetch the authenticated account's home timeline.
    ///
    /// Only an authentication failure is returned as an error; anything
    /// else is logged and yields an empty batch.
    pub async fn timeline(&self, user_id: &str) -> Result<Batch> {
        match self
            .api
            .home_timeline(user_id, self.config.timeline_page_size)
            .await
        {
            Ok(posts) => {
                log::info!("Fetched {} posts from home timeline", posts.len());
                Ok(Batch {
                    posts,
                    rate_limited: false,
                })
            }
            Err(e) if e.is_fatal() => Err(anyhow!(e).context("Failed to fetch home timeline")),
            Err(e) if e.is_rate_limited() => {
                log::warn!("Home timeline fetch stopped: {}", e);
                Ok(Batch {
                    posts: Vec::new(),
                    rate_limited: true,
                })
            }
            Err(e) => {
                log::warn!("Error fetching home timeline: {}", e);
                Ok(Batch::default())
            }
        }
    }

    /// Run the configured search strategy
    pub async fn search(&self) -> Result<Batch> {
        match &self.config.search {
            SearchStrategy::Keyword { query, language } => {
                let query = keyword_query(query, language.as_deref());
                self.run_queries(&[query]).await
            }
            SearchStrategy::Authors {
                accounts,
                fallback_queries,
            } => {
                let queries = author_queries(accounts);
                let batch = self.run_queries(&queries).await?;
                if batch.is_empty() && !batch.rate_limited && !fallback_queries.is_empty() {
                    log::info!(
                        "No posts from {} followed accounts, trying {} fallback queries",
                        accounts.len(),
                        fallback_queries.len()
                    );
                    return self.run_queries(fallback_queries).await;
                }
                Ok(batch)
            }
        }
    }

    async fn run_queries(&self, queries: &[String]) -> Result<Batch> {
        let mut batch = Batch::default();

        for query in queries {
            match self.run_query(query).await {
                Ok(posts) => batch.extend(Batch {
                    posts,
                    rate_limited: false,
                }),
                Err(QueryFailure::RateLimited) => {
                    batch.rate_limited = true;
                    break;
                }
                Err(QueryFailure::Skipped) => continue,
                Err(QueryFailure::Fatal(e)) => {
                    return Err(anyhow!(e).context(format!("Search for '{}' was refused", query)));
                }
            }
        }

        log::info!(
            "Search returned {} posts across {} queries",
            batch.len(),
            queries.len()
        );
        Ok(batch)
    }

    async fn run_query(&self, query: &str) -> std::result::Result<Vec<Post>, QueryFailure> {
        match self
            .api
            .search_recent(query, self.config.search_page_size)
            .await
        {
            Ok(posts) => Ok(posts),
            Err(e @ ApiError::RateLimited { .. }) => {
                log::warn!("Search stopped on rate limit: {}", e);
                Err(QueryFailure::RateLimited)
            }
            Err(e) if e.is_fatal() => Err(QueryFailure::Fatal(e)),
            Err(e) => {
                log::warn!("Error searching for '{}': {}", query, e);
                Err(QueryFailure::Skipped)
            }
        }
    }
}

pub fn keyword_query(query: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) if !query.contains("lang:") => format!("{} lang:{}", query, lang),
        _ => query.to_string(),
    }
}

/// Build `(from:a OR from:b ...) -is:retweet -is:reply` queries, splitting
/// the account list so that no query exceeds `MAX_QUERY_LEN`.
pub fn author_queries(accounts: &[String]) -> Vec<String> {
    let overhead = "()".len() + AUTHOR_QUERY_SUFFIX.len();
    let mut queries = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for account in accounts {
        let clause = format!("from:{}", account);

        if !current.is_empty()
            && current_len + " OR ".len() + clause.len() + overhead > MAX_QUERY_LEN
        {
            queries.push(finish_author_query(&current));
            current.clear();
            current_len = 0;
        }

        if !current.is_empty() {
            current_len += " OR ".len();
        }
        current_len += clause.len();
        current.push(clause);
    }

    if !current.is_empty() {
        queries.push(finish_author_query(&current));
    }
    queries
}

fn finish_author_query(clauses: &[String]) -> String {
    format!("({}){}", clauses.join(" OR "), AUTHOR_QUERY_SUFFIX)
}
