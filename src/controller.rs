/// Run Controller Module
///
/// One pass of the bot: fetch candidates (timeline first, search when the
/// timeline is sparse), drop already processed ids, evaluate each post and
/// act on it within the per-run action budget, then persist the processed
/// set. A rate limit on an action ends the run at once; progress made so
/// far is still written out.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::actions::{ActionExecutor, ActionKind, ActionReason, ActionResult};
use crate::config::Config;
use crate::criteria::{self, Decision};
use crate::feed::{Batch, FeedSource};
use crate::post::Post;
use crate::processed::{ProcessedSet, ProcessedStore};
use crate::x_api::XApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// An action (or the account lookup) was rate limited
    RateLimited,
    /// Every fetch was rate limited and nothing was collected
    FetchRateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    /// The per-run action budget was used up before every candidate was handled
    CapReached,
    Aborted(AbortReason),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::CapReached => write!(f, "action cap reached"),
            RunOutcome::Aborted(AbortReason::RateLimited) => write!(f, "aborted on rate limit"),
            RunOutcome::Aborted(AbortReason::FetchRateLimited) => {
                write!(f, "aborted, feed rate limited")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub seen: usize,
    pub skipped_duplicate: usize,
    pub skipped_own: usize,
    pub skipped_stale: usize,
    /// Evaluated and found below every threshold
    pub no_action: usize,
    pub liked: usize,
    pub reposted: usize,
    pub already_done: usize,
    pub failed: usize,
    /// Remote like/repost calls issued, whatever their result
    pub actions_attempted: usize,
}

impl RunStats {
    pub fn actions_taken(&self) -> usize {
        self.liked + self.reposted
    }

    fn record(&mut self, kind: ActionKind, result: &ActionResult) {
        self.actions_attempted += 1;
        match (result.reason, kind) {
            (ActionReason::Ok, ActionKind::Like) => self.liked += 1,
            (ActionReason::Ok, ActionKind::Repost) => self.reposted += 1,
            (ActionReason::AlreadyDone, _) => self.already_done += 1,
            (ActionReason::Forbidden, _) | (ActionReason::OtherError, _) => self.failed += 1,
            (ActionReason::RateLimited, _) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub outcome: RunOutcome,
    pub finished_at: DateTime<Utc>,
}

/// What happened to a single post's planned actions
enum PostOutcome {
    Handled,
    RateLimited,
}

/// Execute one complete run.
///
/// Returns an error only for fatal conditions: refused credentials or a
/// state file that cannot be written.
pub async fn run_once(api: &dyn XApi, config: &Config) -> Result<RunReport> {
    let store = ProcessedStore::new(&config.state_file, config.state_cap);
    let mut processed = store.load();
    let mut stats = RunStats::default();

    log::info!(
        "Starting run ({} ids already processed, max {} actions)",
        processed.len(),
        config.limits.max_actions_per_run
    );

    let me = match api.get_me().await {
        Ok(account) => account,
        Err(e) if e.is_rate_limited() => {
            log::warn!("Account lookup rate limited ({}). Ending run.", e);
            return Ok(finish(stats, RunOutcome::Aborted(AbortReason::RateLimited)));
        }
        Err(e) => {
            return Err(anyhow!(e).context("Failed to look up the authenticated account"));
        }
    };
    log::info!("Authenticated as @{} ({})", me.username, me.id);

    let feed = FeedSource::new(api, &config.feed);
    let candidates = gather_candidates(&feed, &me.id, config.feed.timeline_floor).await?;
    stats.seen = candidates.len();
    log::info!("Total candidate posts: {}", candidates.len());

    if candidates.is_empty() && candidates.rate_limited {
        return Ok(finish(stats, RunOutcome::Aborted(AbortReason::FetchRateLimited)));
    }

    let executor = ActionExecutor::new(api, &me.id);
    let now = Utc::now();
    let mut outcome = RunOutcome::Completed;

    for post in &candidates.posts {
        if processed.contains(&post.id) {
            stats.skipped_duplicate += 1;
            continue;
        }

        if post.is_authored_by(&me.id) {
            stats.skipped_own += 1;
            processed.add(post.id.as_str());
            continue;
        }

        if let Some(max_age) = config.limits.max_post_age {
            if post.is_older_than(max_age, now) {
                stats.skipped_stale += 1;
                processed.add(post.id.as_str());
                continue;
            }
        }

        let decision = criteria::evaluate(post, &config.thresholds);
        if decision.is_empty() {
            stats.no_action += 1;
            processed.add(post.id.as_str());
            continue;
        }

        let remaining = config
            .limits
            .max_actions_per_run
            .saturating_sub(stats.actions_attempted);
        if remaining == 0 {
            log::info!(
                "Action cap of {} reached, leaving remaining posts for the next run",
                config.limits.max_actions_per_run
            );
            outcome = RunOutcome::CapReached;
            break;
        }
        if decision.action_count() > remaining {
            log::info!(
                "Post {} needs {} actions but only {} remain this run, skipping it for now",
                post.id,
                decision.action_count(),
                remaining
            );
            outcome = RunOutcome::CapReached;
            continue;
        }

        log_candidate(post, decision);

        match act_on(&executor, post, decision, config, &mut stats).await {
            PostOutcome::Handled => {
                processed.add(post.id.as_str());
                if config.limits.persist_each_action {
                    persist_incrementally(&store, &processed);
                }
            }
            PostOutcome::RateLimited => {
                log::warn!("Rate limit hit while acting on {}. Stopping this run.", post.id);
                outcome = RunOutcome::Aborted(AbortReason::RateLimited);
                break;
            }
        }
    }

    store
        .save(&processed)
        .context("Failed to persist processed posts")?;

    let report = finish(stats, outcome);
    log::info!(
        "Run {}: {} seen, {} duplicates, {} actions taken ({} liked, {} reposted)",
        report.outcome,
        report.stats.seen,
        report.stats.skipped_duplicate,
        report.stats.actions_taken(),
        report.stats.liked,
        report.stats.reposted
    );
    Ok(report)
}

/// Timeline first; search results are added when the timeline comes back
/// with fewer than `floor` posts.
async fn gather_candidates(feed: &FeedSource<'_>, user_id: &str, floor: usize) -> Result<Batch> {
    log::info!("Fetching posts from home timeline...");
    let mut batch = feed.timeline(user_id).await?;

    if batch.len() < floor {
        log::info!(
            "Timeline returned {} posts (floor {}), searching for more...",
            batch.len(),
            floor
        );
        let found = feed.search().await?;
        batch.extend(found);
    }

    Ok(batch)
}

/// Repost first, then like. Each call after the first in a run is preceded
/// by the configured delay.
async fn act_on(
    executor: &ActionExecutor<'_>,
    post: &Post,
    decision: Decision,
    config: &Config,
    stats: &mut RunStats,
) -> PostOutcome {
    let planned = [
        (decision.repost, ActionKind::Repost),
        (decision.like, ActionKind::Like),
    ];

    for kind in planned
        .iter()
        .filter(|(wanted, _)| *wanted)
        .map(|(_, kind)| *kind)
    {
        if stats.actions_attempted > 0 && !config.limits.action_delay.is_zero() {
            tokio::time::sleep(config.limits.action_delay).await;
        }

        let result = executor.perform(kind, &post.id).await;
        stats.record(kind, &result);

        if result.is_rate_limited() {
            return PostOutcome::RateLimited;
        }
    }

    PostOutcome::Handled
}

fn persist_incrementally(store: &ProcessedStore, processed: &ProcessedSet) {
    if let Err(e) = store.save(processed) {
        log::warn!("Failed to save progress: {:#}", e);
    }
}

fn log_candidate(post: &Post, decision: Decision) {
    let m = &post.metrics;
    log::info!(
        "High-engagement post {} (likes: {}, reposts: {}, replies: {}) -> repost: {}, like: {}",
        post.id,
        m.like_count,
        m.retweet_count,
        m.reply_count,
        decision.repost,
        decision.like
    );
}

fn finish(stats: RunStats, outcome: RunOutcome) -> RunReport {
    RunReport {
        stats,
        outcome,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_counts_each_reason() {
        let mut stats = RunStats::default();
        stats.record(ActionKind::Like, &ActionResult::ok());
        stats.record(ActionKind::Repost, &ActionResult::ok());
        stats.record(ActionKind::Like, &ActionResult::failed(ActionReason::AlreadyDone));
        stats.record(ActionKind::Repost, &ActionResult::failed(ActionReason::Forbidden));
        stats.record(ActionKind::Like, &ActionResult::failed(ActionReason::RateLimited));

        assert_eq!(stats.actions_attempted, 5);
        assert_eq!(stats.liked, 1);
        assert_eq!(stats.reposted, 1);
        assert_eq!(stats.already_done, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.actions_taken(), 2);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RunOutcome::Completed.to_string(), "completed");
        assert_eq!(
            RunOutcome::Aborted(AbortReason::RateLimited).to_string(),
            "aborted on rate limit"
        );
    }
}
