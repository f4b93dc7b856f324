/// Configuration module for credentials, thresholds and run limits
///
/// Everything the bot needs is read once at startup (typically from a .env
/// file) into a `Config` that is passed by reference to every component.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::criteria::{EngagementProxy, Thresholds};

/// Largest page the timeline endpoint accepts
const TIMELINE_PAGE_MAX: u32 = 100;
/// Search pages must hold between 10 and 100 posts
const SEARCH_PAGE_MIN: u32 = 10;
const SEARCH_PAGE_MAX: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
    pub bearer_token: String,
}

/// How search mode builds its queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStrategy {
    /// A single fixed query, optionally restricted to one language
    Keyword {
        query: String,
        language: Option<String>,
    },
    /// Posts by any of the listed accounts. When those queries come back
    /// empty the fallback queries are tried instead.
    Authors {
        accounts: Vec<String>,
        fallback_queries: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub timeline_page_size: u32,
    pub search_page_size: u32,
    /// Below this many timeline posts, search results are added to the batch
    pub timeline_floor: usize,
    pub search: SearchStrategy,
}

#[derive(Debug, Clone)]
pub struct RunLimits {
    pub max_actions_per_run: usize,
    /// Pause between consecutive like/repost calls
    pub action_delay: Duration,
    /// Posts older than this are skipped. `None` disables the check.
    pub max_post_age: Option<chrono::Duration>,
    /// Write the processed set after every post that was acted on
    pub persist_each_action: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,

    /// API root, e.g. "https://api.twitter.com"
    pub api_base_url: String,

    pub http_timeout: Duration,

    pub thresholds: Thresholds,

    pub feed: FeedConfig,

    pub limits: RunLimits,

    /// JSON file holding the ids of already processed posts
    pub state_file: PathBuf,

    /// Number of most recent ids kept when the state file is written
    pub state_cap: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeline_page_size: 10,
            search_page_size: 10,
            timeline_floor: 5,
            search: SearchStrategy::Keyword {
                query: "has:media -is:retweet -is:reply".to_string(),
                language: None,
            },
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_actions_per_run: 5,
            action_delay: Duration::from_secs(2),
            max_post_age: Some(chrono::Duration::hours(24)),
            persist_each_action: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            api_base_url: "https://api.twitter.com".to_string(),
            http_timeout: Duration::from_secs(30),
            thresholds: Thresholds::default(),
            feed: FeedConfig::default(),
            limits: RunLimits::default(),
            state_file: PathBuf::from("processed_tweets.json"),
            state_cap: 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Credentials are not validated here; a missing key shows up as an
    /// authentication failure on the first API call.
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let non_empty = |key: &str| text(key).filter(|v| !v.is_empty());
        let number = |key: &str| -> Option<u64> { text(key).and_then(|v| v.parse().ok()) };

        let credentials = Credentials {
            api_key: text("X_API_KEY").unwrap_or_default(),
            api_secret: text("X_API_SECRET").unwrap_or_default(),
            access_token: text("X_ACCESS_TOKEN").unwrap_or_default(),
            access_secret: text("X_ACCESS_SECRET").unwrap_or_default(),
            bearer_token: text("X_BEARER_TOKEN").unwrap_or_default(),
        };

        let default_thresholds = defaults.thresholds;
        let thresholds = Thresholds {
            like_min_likes: number("LIKE_MIN_LIKES").unwrap_or(default_thresholds.like_min_likes),
            like_min_reposts: number("LIKE_MIN_REPOSTS")
                .unwrap_or(default_thresholds.like_min_reposts),
            repost_min_likes: number("REPOST_MIN_LIKES")
                .unwrap_or(default_thresholds.repost_min_likes),
            repost_mid_likes: number("REPOST_MID_LIKES")
                .unwrap_or(default_thresholds.repost_mid_likes),
            repost_mid_reposts: number("REPOST_MID_REPOSTS")
                .unwrap_or(default_thresholds.repost_mid_reposts),
            engagement_proxy: number("MIN_CLICKS").map(|min_clicks| EngagementProxy {
                min_clicks,
                divisor: number("CLICK_PROXY_DIVISOR").unwrap_or(10),
            }),
        };

        let accounts = parse_list(text("TARGET_ACCOUNTS").as_deref(), ',')
            .into_iter()
            .map(|account| account.trim_start_matches('@').to_string())
            .filter(|account| !account.is_empty())
            .collect::<Vec<_>>();

        let search = if accounts.is_empty() {
            let default_query = match defaults.feed.search {
                SearchStrategy::Keyword { query, .. } => query,
                SearchStrategy::Authors { .. } => String::new(),
            };
            SearchStrategy::Keyword {
                query: non_empty("SEARCH_QUERY").unwrap_or(default_query),
                language: non_empty("SEARCH_LANGUAGE"),
            }
        } else {
            let fallback_queries = match text("FALLBACK_QUERIES") {
                Some(raw) => parse_list(Some(&raw), ';'),
                None => default_fallback_queries(),
            };
            SearchStrategy::Authors {
                accounts,
                fallback_queries,
            }
        };

        let feed = FeedConfig {
            timeline_page_size: number("TIMELINE_PAGE_SIZE")
                .map(|v| v.clamp(1, TIMELINE_PAGE_MAX as u64) as u32)
                .unwrap_or(defaults.feed.timeline_page_size),
            search_page_size: number("SEARCH_PAGE_SIZE")
                .map(|v| v.clamp(SEARCH_PAGE_MIN as u64, SEARCH_PAGE_MAX as u64) as u32)
                .unwrap_or(defaults.feed.search_page_size),
            timeline_floor: number("TIMELINE_FLOOR")
                .map(|v| v as usize)
                .unwrap_or(defaults.feed.timeline_floor),
            search,
        };

        let limits = RunLimits {
            max_actions_per_run: number("MAX_ACTIONS_PER_RUN")
                .map(|v| v as usize)
                .unwrap_or(defaults.limits.max_actions_per_run),
            action_delay: number("ACTION_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.limits.action_delay),
            max_post_age: match number("MAX_POST_AGE_HOURS") {
                Some(0) => None,
                Some(hours) => Some(chrono::Duration::hours(hours.min(24 * 365) as i64)),
                None => defaults.limits.max_post_age,
            },
            persist_each_action: text("PERSIST_EACH_ACTION")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.limits.persist_each_action),
        };

        Config {
            credentials,
            api_base_url: non_empty("X_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            http_timeout: number("HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            thresholds,
            feed,
            limits,
            state_file: non_empty("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_file),
            state_cap: number("STATE_CAP")
                .map(|v| v as usize)
                .unwrap_or(defaults.state_cap),
        }
    }
}

fn default_fallback_queries() -> Vec<String> {
    vec![
        "trending -is:retweet -is:reply lang:en".to_string(),
        "breaking news -is:retweet -is:reply lang:en".to_string(),
    ]
}

fn parse_list(raw: Option<&str>, separator: char) -> Vec<String> {
    raw.map(|value| {
        value
            .split(separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]);

        assert_eq!(config.credentials.api_key, "");
        assert_eq!(config.api_base_url, "https://api.twitter.com");
        assert_eq!(config.limits.max_actions_per_run, 5);
        assert_eq!(config.state_cap, 1000);
        assert_eq!(config.state_file, PathBuf::from("processed_tweets.json"));
        assert!(config.thresholds.engagement_proxy.is_none());
        assert!(matches!(config.feed.search, SearchStrategy::Keyword { .. }));
    }

    #[test]
    fn test_credentials_are_read() {
        let config = config_from(&[
            ("X_API_KEY", "key"),
            ("X_API_SECRET", "secret"),
            ("X_ACCESS_TOKEN", "token"),
            ("X_ACCESS_SECRET", "token-secret"),
            ("X_BEARER_TOKEN", " bearer \n"),
        ]);

        assert_eq!(config.credentials.api_key, "key");
        assert_eq!(config.credentials.api_secret, "secret");
        assert_eq!(config.credentials.access_token, "token");
        assert_eq!(config.credentials.access_secret, "token-secret");
        assert_eq!(config.credentials.bearer_token, "bearer");
    }

    #[test]
    fn test_target_accounts_switch_to_author_search() {
        let config = config_from(&[
            ("TARGET_ACCOUNTS", "@alice, bob ,,carol"),
            ("FALLBACK_QUERIES", "rust lang:en; open source"),
        ]);

        assert_eq!(
            config.feed.search,
            SearchStrategy::Authors {
                accounts: vec!["alice".into(), "bob".into(), "carol".into()],
                fallback_queries: vec!["rust lang:en".into(), "open source".into()],
            }
        );
    }

    #[test]
    fn test_author_search_has_default_fallbacks() {
        let config = config_from(&[("TARGET_ACCOUNTS", "alice")]);
        match config.feed.search {
            SearchStrategy::Authors {
                fallback_queries, ..
            } => assert!(!fallback_queries.is_empty()),
            other => panic!("expected author search, got {:?}", other),
        }
    }

    #[test]
    fn test_page_sizes_are_clamped() {
        let config = config_from(&[("TIMELINE_PAGE_SIZE", "500"), ("SEARCH_PAGE_SIZE", "3")]);
        assert_eq!(config.feed.timeline_page_size, 100);
        assert_eq!(config.feed.search_page_size, 10);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("MAX_ACTIONS_PER_RUN", "lots"), ("STATE_CAP", "-1")]);
        assert_eq!(config.limits.max_actions_per_run, 5);
        assert_eq!(config.state_cap, 1000);
    }

    #[test]
    fn test_min_clicks_enables_engagement_proxy() {
        let config = config_from(&[("MIN_CLICKS", "1000")]);
        let proxy = config.thresholds.engagement_proxy.expect("proxy enabled");
        assert_eq!(proxy.min_clicks, 1000);
        assert_eq!(proxy.divisor, 10);
        assert_eq!(proxy.min_engagement(), 100);
    }

    #[test]
    fn test_zero_max_age_disables_staleness_check() {
        let config = config_from(&[("MAX_POST_AGE_HOURS", "0")]);
        assert!(config.limits.max_post_age.is_none());

        let config = config_from(&[("MAX_POST_AGE_HOURS", "6")]);
        assert_eq!(config.limits.max_post_age, Some(chrono::Duration::hours(6)));
    }

    #[test]
    fn test_persist_each_action_flag() {
        let config = config_from(&[("PERSIST_EACH_ACTION", "no")]);
        assert!(!config.limits.persist_each_action);

        let config = config_from(&[("PERSIST_EACH_ACTION", "maybe")]);
        assert!(config.limits.persist_each_action);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = config_from(&[("X_API_BASE_URL", "http://localhost:8080/")]);
        assert_eq!(config.api_base_url, "http://localhost:8080");
    }
}
