/// Criteria Module
///
/// Decides, from a post's engagement counts alone, whether it deserves a
/// like and whether it deserves a repost. Thresholds are static.

use crate::post::Post;

/// Approximate click/impression gate.
///
/// The API does not expose impressions, so the summed engagement counts are
/// compared against `min_clicks / divisor`. The divisor is a guess, not a
/// verified conversion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementProxy {
    pub min_clicks: u64,
    pub divisor: u64,
}

impl EngagementProxy {
    pub fn min_engagement(&self) -> u64 {
        self.min_clicks / self.divisor.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Likes needed for a like
    pub like_min_likes: u64,
    /// Reposts that also earn a like, regardless of likes
    pub like_min_reposts: u64,
    /// Likes needed for a repost on their own
    pub repost_min_likes: u64,
    /// Likes and reposts that together earn a repost
    pub repost_mid_likes: u64,
    pub repost_mid_reposts: u64,
    pub engagement_proxy: Option<EngagementProxy>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            like_min_likes: 1000,
            like_min_reposts: 200,
            repost_min_likes: 5000,
            repost_mid_likes: 2000,
            repost_mid_reposts: 500,
            engagement_proxy: None,
        }
    }
}

/// What to do with a single post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decision {
    pub like: bool,
    pub repost: bool,
}

impl Decision {
    /// Number of remote calls this decision will cost
    pub fn action_count(&self) -> usize {
        usize::from(self.like) + usize::from(self.repost)
    }

    pub fn is_empty(&self) -> bool {
        !self.like && !self.repost
    }
}

fn meets_proxy(post: &Post, thresholds: &Thresholds) -> bool {
    thresholds
        .engagement_proxy
        .map(|proxy| post.metrics.total_engagement() >= proxy.min_engagement())
        .unwrap_or(false)
}

pub fn should_like(post: &Post, thresholds: &Thresholds) -> bool {
    let m = &post.metrics;
    m.like_count >= thresholds.like_min_likes
        || m.retweet_count >= thresholds.like_min_reposts
        || meets_proxy(post, thresholds)
}

pub fn should_repost(post: &Post, thresholds: &Thresholds) -> bool {
    let m = &post.metrics;
    m.like_count >= thresholds.repost_min_likes
        || (m.like_count >= thresholds.repost_mid_likes
            && m.retweet_count >= thresholds.repost_mid_reposts)
        || meets_proxy(post, thresholds)
}

pub fn evaluate(post: &Post, thresholds: &Thresholds) -> Decision {
    Decision {
        like: should_like(post, thresholds),
        repost: should_repost(post, thresholds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Metrics;

    fn post(likes: u64, reposts: u64) -> Post {
        Post::new(
            "1",
            Metrics {
                like_count: likes,
                retweet_count: reposts,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_repost_threshold_alone_is_enough() {
        let t = Thresholds::default();
        for likes in [t.repost_min_likes, t.repost_min_likes + 1, u64::MAX] {
            assert!(should_repost(&post(likes, 0), &t), "likes = {}", likes);
        }
    }

    #[test]
    fn test_below_every_threshold_does_nothing() {
        let t = Thresholds::default();
        let quiet = post(t.like_min_likes - 1, t.like_min_reposts - 1);
        assert!(!should_like(&quiet, &t));
        assert!(!should_repost(&quiet, &t));
        assert!(evaluate(&quiet, &t).is_empty());
    }

    #[test]
    fn test_like_by_reposts_alone() {
        let t = Thresholds::default();
        let p = post(0, t.like_min_reposts);
        assert!(should_like(&p, &t));
        assert!(!should_repost(&p, &t));
    }

    #[test]
    fn test_repost_needs_both_mid_thresholds() {
        let t = Thresholds::default();
        assert!(should_repost(&post(t.repost_mid_likes, t.repost_mid_reposts), &t));
        assert!(!should_repost(&post(t.repost_mid_likes, t.repost_mid_reposts - 1), &t));
        assert!(!should_repost(&post(t.repost_mid_likes - 1, t.repost_mid_reposts), &t));
    }

    #[test]
    fn test_missing_metrics_are_zero() {
        let t = Thresholds::default();
        let bare = Post::new("1", Metrics::default());
        assert_eq!(evaluate(&bare, &t), Decision::default());
    }

    #[test]
    fn test_engagement_proxy() {
        let t = Thresholds {
            engagement_proxy: Some(EngagementProxy {
                min_clicks: 1000,
                divisor: 10,
            }),
            ..Default::default()
        };
        let chatty = Post::new(
            "1",
            Metrics {
                like_count: 40,
                retweet_count: 10,
                reply_count: 30,
                quote_count: 20,
            },
        );
        let decision = evaluate(&chatty, &t);
        assert!(decision.like);
        assert!(decision.repost);

        let without_proxy = Thresholds::default();
        assert!(evaluate(&chatty, &without_proxy).is_empty());
    }

    #[test]
    fn test_proxy_zero_divisor_does_not_panic() {
        let proxy = EngagementProxy {
            min_clicks: 500,
            divisor: 0,
        };
        assert_eq!(proxy.min_engagement(), 500);
    }

    #[test]
    fn test_action_count() {
        assert_eq!(Decision::default().action_count(), 0);
        assert_eq!(Decision { like: true, repost: false }.action_count(), 1);
        assert_eq!(Decision { like: true, repost: true }.action_count(), 2);
    }
}
