//! Legacy v1 hot score, retained for A/B comparison against v2.
//!
//! Log-damped vote score plus flat-weighted discussion terms, divided by
//! the square root of the age. Comment entries add a reply term, bounty
//! entries an amount term. Negative vote scores contribute linearly.

use chrono::{DateTime, Utc};

use super::signals;
use super::snapshot::{ContentSnapshot, MetricsSnapshot};
use crate::config::ScoringConfig;
use crate::db::models::ContentKind;

/// Compute the legacy v1 hot score, floored to an integer, never negative
pub fn compute_legacy(
    kind: ContentKind,
    content: &ContentSnapshot,
    metrics: &MetricsSnapshot,
    entry_action_date: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> i64 {
    let weights = &config.legacy;
    let vote_score = signals::votes(metrics) as f64;

    let mut score = if vote_score > 0.0 {
        (vote_score + 1.0).ln() * weights.upvote
    } else {
        vote_score
    };

    score += (signals::comment_count(metrics) as f64 + 1.0).ln() * weights.comment;

    match kind {
        ContentKind::Comment => {
            score += (signals::reply_count(metrics) as f64 + 1.0).ln() * weights.reply;
        }
        ContentKind::Bounty => {
            let bounty =
                signals::bounties(content, now, config.bounty_urgency_window_hours);
            score += (bounty.total + 1.0).ln() * weights.bounty;
        }
        ContentKind::Paper | ContentKind::Post => {}
    }

    let age_hours =
        signals::age_hours(content, entry_action_date, now, config.deadline_window_hours);
    let decayed = score / age_hours.sqrt();

    (decayed.floor() as i64).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2025-08-01T12:00:00Z".parse().expect("fixed clock")
    }

    fn legacy_for(kind: ContentKind, content: serde_json::Value, metrics: serde_json::Value, hours_old: i64) -> i64 {
        compute_legacy(
            kind,
            &ContentSnapshot::from_value(&content),
            &MetricsSnapshot::from_value(&metrics),
            now() - Duration::hours(hours_old),
            now(),
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn test_worked_example() {
        // votes=5, replies=3, one review: comment count resolves to 2,
        // so score = (ln(6)*10 + ln(3)*5) / sqrt(2) = 16.55...
        let metrics = json!({"votes": 5, "replies": 3, "review_metrics": {"count": 1}});

        let at_2h = legacy_for(ContentKind::Paper, json!({}), metrics.clone(), 2);
        assert_eq!(at_2h, 16);

        let at_48h = legacy_for(ContentKind::Paper, json!({}), metrics, 48);
        assert_eq!(at_48h, 3);
        assert!(at_2h > at_48h);
    }

    #[test]
    fn test_comment_kind_adds_reply_term() {
        let metrics = json!({"votes": 2, "replies": 7});
        let as_comment = legacy_for(ContentKind::Comment, json!({}), metrics.clone(), 4);
        let as_post = legacy_for(ContentKind::Post, json!({}), metrics, 4);
        assert!(as_comment > as_post);
    }

    #[test]
    fn test_bounty_kind_adds_amount_term() {
        let content = json!({"bounties": [{"amount": "200", "status": "OPEN"}]});
        let as_bounty = legacy_for(ContentKind::Bounty, content.clone(), json!({}), 4);
        let as_paper = legacy_for(ContentKind::Paper, content, json!({}), 4);
        assert!(as_bounty > as_paper);
    }

    #[test]
    fn test_negative_votes_contribute_linearly() {
        let metrics = json!({"votes": -8, "replies": 2});
        // ln(3)*5 - 8 < 0, clamped after flooring
        assert_eq!(legacy_for(ContentKind::Paper, json!({}), metrics, 1), 0);

        let mildly_negative = json!({"votes": -1, "replies": 20});
        // ln(21)*5 - 1 = 14.2..., still positive
        assert!(legacy_for(ContentKind::Paper, json!({}), mildly_negative, 1) > 0);
    }

    #[test]
    fn test_empty_snapshots_score_zero() {
        assert_eq!(legacy_for(ContentKind::Paper, json!({}), json!({}), 10), 0);
    }

    #[test]
    fn test_age_floor() {
        let metrics = json!({"votes": 9});
        let config = ScoringConfig::default();
        let young = compute_legacy(
            ContentKind::Paper,
            &ContentSnapshot::default(),
            &MetricsSnapshot::from_value(&metrics),
            now() - Duration::minutes(2),
            now(),
            &config,
        );
        let hour_old = compute_legacy(
            ContentKind::Paper,
            &ContentSnapshot::default(),
            &MetricsSnapshot::from_value(&metrics),
            now() - Duration::hours(1),
            now(),
            &config,
        );
        assert_eq!(young, hour_old);
    }
}
