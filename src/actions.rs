/// Actions Module
///
/// Performs likes and reposts for the authenticated account. Expected
/// rejections come back as an `ActionResult`, never as an error.

use std::fmt;

use crate::error::ApiError;
use crate::x_api::XApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Like,
    Repost,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Like => write!(f, "like"),
            ActionKind::Repost => write!(f, "repost"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionReason {
    Ok,
    AlreadyDone,
    Forbidden,
    RateLimited,
    OtherError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionResult {
    pub succeeded: bool,
    pub reason: ActionReason,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            reason: ActionReason::Ok,
        }
    }

    pub fn failed(reason: ActionReason) -> Self {
        Self {
            succeeded: false,
            reason,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.reason == ActionReason::RateLimited
    }
}

impl From<&ApiError> for ActionReason {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::RateLimited { .. } => ActionReason::RateLimited,
            ApiError::AlreadyDone(_) => ActionReason::AlreadyDone,
            ApiError::Forbidden(_) => ActionReason::Forbidden,
            ApiError::Unauthorized(_)
            | ApiError::Transient(_)
            | ApiError::Rejected { .. }
            | ApiError::Malformed(_) => ActionReason::OtherError,
        }
    }
}

pub struct ActionExecutor<'a> {
    api: &'a dyn XApi,
    user_id: &'a str,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(api: &'a dyn XApi, user_id: &'a str) -> Self {
        Self { api, user_id }
    }

    pub async fn like(&self, post_id: &str) -> ActionResult {
        self.perform(ActionKind::Like, post_id).await
    }

    pub async fn repost(&self, post_id: &str) -> ActionResult {
        self.perform(ActionKind::Repost, post_id).await
    }

    /// Issue exactly one remote call for `kind`
    pub async fn perform(&self, kind: ActionKind, post_id: &str) -> ActionResult {
        let outcome = match kind {
            ActionKind::Like => self.api.like(self.user_id, post_id).await,
            ActionKind::Repost => self.api.repost(self.user_id, post_id).await,
        };

        match outcome {
            Ok(()) => {
                log::info!("✓ {} {}", past_tense(kind), post_id);
                ActionResult::ok()
            }
            Err(e) => {
                let reason = ActionReason::from(&e);
                match reason {
                    ActionReason::AlreadyDone | ActionReason::Forbidden => {
                        log::info!("Skipped {} of {}: {}", kind, post_id, e);
                    }
                    _ => {
                        log::warn!("✗ Error on {} of {}: {}", kind, post_id, e);
                    }
                }
                ActionResult::failed(reason)
            }
        }
    }
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Like => "Liked",
        ActionKind::Repost => "Reposted",
    }
}
