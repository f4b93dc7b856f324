/// In-memory `XApi` for tests
///
/// Serves a fixed timeline and per-query search results, records every call,
/// and lets tests script the outcome of individual like/repost calls. Without
/// a scripted outcome, acting twice on the same post reports `AlreadyDone`,
/// like the real platform does.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::error::ApiError;
use crate::post::Post;
use crate::x_api::{Account, XApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetMe,
    HomeTimeline { user_id: String, max_results: u32 },
    Search { query: String, max_results: u32 },
    Like { user_id: String, post_id: String },
    Repost { user_id: String, post_id: String },
}

pub struct MockXApi {
    account: Result<Account, ApiError>,
    timeline: Result<Vec<Post>, ApiError>,
    search: HashMap<String, Result<Vec<Post>, ApiError>>,
    like_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    repost_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    liked: Mutex<HashSet<String>>,
    reposted: Mutex<HashSet<String>>,
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockXApi {
    fn default() -> Self {
        Self {
            account: Ok(Account {
                id: "1000".to_string(),
                username: "mock_bot".to_string(),
            }),
            timeline: Ok(Vec::new()),
            search: HashMap::new(),
            like_responses: Mutex::new(VecDeque::new()),
            repost_responses: Mutex::new(VecDeque::new()),
            liked: Mutex::new(HashSet::new()),
            reposted: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockXApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, id: &str) -> Self {
        self.account = Ok(Account {
            id: id.to_string(),
            username: format!("user_{}", id),
        });
        self
    }

    pub fn with_me_error(mut self, error: ApiError) -> Self {
        self.account = Err(error);
        self
    }

    pub fn with_timeline(mut self, posts: Vec<Post>) -> Self {
        self.timeline = Ok(posts);
        self
    }

    pub fn with_timeline_error(mut self, error: ApiError) -> Self {
        self.timeline = Err(error);
        self
    }

    /// Results for one exact query string. Unknown queries return nothing.
    pub fn with_search_results(mut self, query: &str, posts: Vec<Post>) -> Self {
        self.search.insert(query.to_string(), Ok(posts));
        self
    }

    pub fn with_search_error(mut self, query: &str, error: ApiError) -> Self {
        self.search.insert(query.to_string(), Err(error));
        self
    }

    /// Queue the outcome of the next unscripted like call
    pub fn with_like_response(self, response: Result<(), ApiError>) -> Self {
        self.like_responses.lock().unwrap().push_back(response);
        self
    }

    /// Queue the outcome of the next unscripted repost call
    pub fn with_repost_response(self, response: Result<(), ApiError>) -> Self {
        self.repost_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Search { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }

    /// Number of like and repost calls made, successful or not
    pub fn action_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MockCall::Like { .. } | MockCall::Repost { .. }))
            .count()
    }

    pub fn liked(&self) -> HashSet<String> {
        self.liked.lock().unwrap().clone()
    }

    pub fn reposted(&self) -> HashSet<String> {
        self.reposted.lock().unwrap().clone()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn act(
        queue: &Mutex<VecDeque<Result<(), ApiError>>>,
        done: &Mutex<HashSet<String>>,
        post_id: &str,
    ) -> Result<(), ApiError> {
        if let Some(scripted) = queue.lock().unwrap().pop_front() {
            if scripted.is_ok() {
                done.lock().unwrap().insert(post_id.to_string());
            }
            return scripted;
        }

        if done.lock().unwrap().insert(post_id.to_string()) {
            Ok(())
        } else {
            Err(ApiError::AlreadyDone(format!("{} already handled", post_id)))
        }
    }
}

#[async_trait]
impl XApi for MockXApi {
    async fn get_me(&self) -> Result<Account, ApiError> {
        self.record(MockCall::GetMe);
        self.account.clone()
    }

    async fn home_timeline(&self, user_id: &str, max_results: u32) -> Result<Vec<Post>, ApiError> {
        self.record(MockCall::HomeTimeline {
            user_id: user_id.to_string(),
            max_results,
        });
        self.timeline
            .clone()
            .map(|posts| posts.into_iter().take(max_results as usize).collect())
    }

    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<Post>, ApiError> {
        self.record(MockCall::Search {
            query: query.to_string(),
            max_results,
        });
        match self.search.get(query) {
            Some(result) => result
                .clone()
                .map(|posts| posts.into_iter().take(max_results as usize).collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn like(&self, user_id: &str, post_id: &str) -> Result<(), ApiError> {
        self.record(MockCall::Like {
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
        });
        Self::act(&self.like_responses, &self.liked, post_id)
    }

    async fn repost(&self, user_id: &str, post_id: &str) -> Result<(), ApiError> {
        self.record(MockCall::Repost {
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
        });
        Self::act(&self.repost_responses, &self.reposted, post_id)
    }
}
