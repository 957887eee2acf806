//! Ranking signal extraction from feed entry snapshots.
//!
//! Every extractor is a pure function over the typed snapshots plus an
//! explicit `now`; missing data yields the documented default, never an
//! error.

use chrono::{DateTime, Utc};

use super::snapshot::{ContentSnapshot, MetricsSnapshot};

/// Entries younger than this score as if they were this old
pub const MIN_AGE_HOURS: f64 = 1.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Open-bounty totals plus whether any of them is about to expire
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BountySignal {
    pub total: f64,
    pub urgent: bool,
}

/// Net vote score; may be negative
pub fn votes(metrics: &MetricsSnapshot) -> i64 {
    metrics.votes.unwrap_or(0)
}

pub fn peer_review_count(metrics: &MetricsSnapshot) -> i64 {
    metrics.review_metrics.as_ref().map(|review| review.count).unwrap_or(0)
}

/// Discussion replies that are not peer reviews, never negative
pub fn comment_count(metrics: &MetricsSnapshot) -> i64 {
    let replies = metrics.replies.unwrap_or(0);
    (replies - peer_review_count(metrics)).max(0)
}

/// Total replies including peer reviews (reply volume on comment entries)
pub fn reply_count(metrics: &MetricsSnapshot) -> i64 {
    metrics.replies.unwrap_or(0)
}

/// Whether any discussion exists; dependent signals use this to avoid
/// double-counting rolled-up comment activity
pub fn has_comments(metrics: &MetricsSnapshot) -> bool {
    metrics.replies.unwrap_or(0) > 0 || peer_review_count(metrics) > 0
}

pub fn altmetric(metrics: &MetricsSnapshot) -> f64 {
    metrics.altmetric_score.unwrap_or(0.0)
}

/// Sum OPEN bounty amounts; urgent when any open bounty expires within
/// `urgency_window_hours` of `now`
pub fn bounties(
    content: &ContentSnapshot,
    now: DateTime<Utc>,
    urgency_window_hours: f64,
) -> BountySignal {
    let mut signal = BountySignal::default();

    for bounty in &content.bounties {
        if bounty.status.as_deref() != Some("OPEN") {
            continue;
        }

        signal.total += bounty.amount;

        if let Some(expiration) = bounty.expiration_date {
            let hours_left = (expiration - now).num_seconds() as f64 / SECONDS_PER_HOUR;
            if hours_left > 0.0 && hours_left < urgency_window_hours {
                signal.urgent = true;
            }
        }
    }

    signal
}

/// Total purchase (tip/boost) amount on the document itself
pub fn tips(content: &ContentSnapshot) -> f64 {
    content.purchases.iter().map(|purchase| purchase.amount).sum()
}

/// Raised fundraise amount, preferring RSC over USD
pub fn fundraise_amount(content: &ContentSnapshot) -> f64 {
    let Some(fundraise) = &content.fundraise else {
        return 0.0;
    };

    fundraise
        .amount_raised
        .rsc
        .or(fundraise.amount_raised.usd)
        .unwrap_or(0.0)
}

/// Age of the entry in hours, floored at [`MIN_AGE_HOURS`].
///
/// The effective date is the snapshot's own `created_date`, falling back to
/// the entry action date. Grants and preregistrations with a deadline inside
/// `deadline_window_hours` instead age as if created
/// `window - time_until_deadline` ago, so near-deadline items surface as
/// fresh.
pub fn age_hours(
    content: &ContentSnapshot,
    entry_action_date: DateTime<Utc>,
    now: DateTime<Utc>,
    deadline_window_hours: f64,
) -> f64 {
    if let Some(deadline) = effective_deadline(content) {
        let hours_to_deadline = (deadline - now).num_seconds() as f64 / SECONDS_PER_HOUR;
        if hours_to_deadline > 0.0 && hours_to_deadline < deadline_window_hours {
            return (deadline_window_hours - hours_to_deadline).max(MIN_AGE_HOURS);
        }
    }

    let effective_date = content.created_date.unwrap_or(entry_action_date);
    let age = (now - effective_date).num_seconds() as f64 / SECONDS_PER_HOUR;
    age.max(MIN_AGE_HOURS)
}

fn effective_deadline(content: &ContentSnapshot) -> Option<DateTime<Utc>> {
    match content.doc_type.as_deref() {
        Some("GRANT") => content.grant.as_ref().and_then(|grant| grant.end_date),
        Some("PREREGISTRATION") => {
            content.fundraise.as_ref().and_then(|fundraise| fundraise.end_date)
        }
        _ => None,
    }
}
