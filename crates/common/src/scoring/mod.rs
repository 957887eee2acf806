//! Hot score computation.
//!
//! Provides:
//! - Signal extraction from content/metrics snapshots (`signals`)
//! - The v2 ranking algorithm: log-damped weighted signals, freshness
//!   boost, polynomial time decay (`compute`)
//! - The legacy v1 algorithm, kept live for A/B comparison (`legacy`)
//! - Human-readable calculation breakdowns (`breakdown`)
//!
//! Both algorithms are pure functions of the stored snapshots, the entry
//! action date, and an explicit `now`; recomputing is always safe.

pub mod breakdown;
pub mod legacy;
pub mod signals;
pub mod snapshot;

pub use breakdown::ScoreBreakdown;
pub use signals::BountySignal;
pub use snapshot::{ContentSnapshot, MetricsSnapshot};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{FreshnessStep, ScoringConfig};
use crate::db::models::ContentKind;

/// Fixed signal ordering used by components and breakdowns
pub const SIGNAL_ORDER: [&str; 6] =
    ["altmetric", "bounty", "tip", "peer_review", "upvote", "comment"];

/// One weighted signal inside a v2 computation
#[derive(Debug, Clone, PartialEq)]
pub struct SignalComponent {
    pub name: &'static str,
    pub raw: f64,
    pub weight: f64,
    pub component: f64,
}

impl SignalComponent {
    fn new(name: &'static str, raw: f64, weight: f64) -> Self {
        Self {
            name,
            raw,
            weight,
            component: damp(raw) * weight,
        }
    }

    fn scaled(mut self, multiplier: f64) -> Self {
        self.component *= multiplier;
        self
    }
}

/// Every intermediate of one v2 evaluation; the breakdown renders this
/// struct, so a breakdown can never drift from the score it explains
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComputation {
    pub kind: ContentKind,
    pub signals: Vec<SignalComponent>,
    pub bounty_urgent: bool,
    pub bounty_multiplier: f64,
    pub engagement: f64,
    pub age_hours: f64,
    pub freshness: f64,
    pub adjusted: f64,
    pub base_hours: f64,
    pub gravity: f64,
    pub denominator: f64,
    pub raw_score: f64,
    pub final_score: i64,
}

/// Both score columns for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryScores {
    pub hot_score: i64,
    pub hot_score_v2: i64,
}

/// Log damping: `ln(x + 1)` for non-negative values, linear pass-through
/// below zero (continuous at 0)
fn damp(raw: f64) -> f64 {
    if raw >= 0.0 {
        (raw + 1.0).ln()
    } else {
        raw
    }
}

/// Resolve the freshness boost for an age from the configured step curve
pub fn freshness_multiplier(age_hours: f64, curve: &[FreshnessStep]) -> f64 {
    for step in curve {
        if age_hours <= step.max_age_hours {
            return step.multiplier;
        }
    }
    1.0
}

/// Compute the v2 hot score with all intermediates.
///
/// Pipeline: per-signal `ln(raw + 1) * weight` components (bounty scaled by
/// the urgency multiplier when an open bounty is about to expire, fundraise
/// amounts folded into tips), summed into engagement, boosted by the
/// freshness curve, then decayed by `(age + base_hours)^gravity`. The final
/// score is `floor(raw * 100)` clamped at zero.
pub fn compute(
    kind: ContentKind,
    content: &ContentSnapshot,
    metrics: &MetricsSnapshot,
    entry_action_date: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> ScoreComputation {
    let weights = &config.weights;

    let age_hours = signals::age_hours(content, entry_action_date, now, config.deadline_window_hours);
    let bounty = signals::bounties(content, now, config.bounty_urgency_window_hours);
    let tip_raw = signals::tips(content) + signals::fundraise_amount(content);

    let bounty_multiplier = if bounty.urgent {
        config.bounty_urgency_multiplier
    } else {
        1.0
    };

    let components = vec![
        SignalComponent::new("altmetric", signals::altmetric(metrics), weights.altmetric),
        SignalComponent::new("bounty", bounty.total, weights.bounty).scaled(bounty_multiplier),
        SignalComponent::new("tip", tip_raw, weights.tip),
        SignalComponent::new(
            "peer_review",
            signals::peer_review_count(metrics) as f64,
            weights.peer_review,
        ),
        SignalComponent::new("upvote", signals::votes(metrics) as f64, weights.upvote),
        SignalComponent::new(
            "comment",
            signals::comment_count(metrics) as f64,
            weights.comment,
        ),
    ];

    let engagement: f64 = components.iter().map(|signal| signal.component).sum();
    let freshness = freshness_multiplier(age_hours, &config.freshness_curve);
    let adjusted = engagement * freshness;
    let denominator =
        (age_hours + config.time_decay.base_hours).powf(config.time_decay.gravity);
    let raw_score = adjusted / denominator;
    let final_score = ((raw_score * 100.0).floor() as i64).max(0);

    ScoreComputation {
        kind,
        signals: components,
        bounty_urgent: bounty.urgent,
        bounty_multiplier,
        engagement,
        age_hours,
        freshness,
        adjusted,
        base_hours: config.time_decay.base_hours,
        gravity: config.time_decay.gravity,
        denominator,
        raw_score,
        final_score,
    }
}

/// Decode raw snapshot JSON and compute both score columns for one entry
pub fn score_entry(
    kind: ContentKind,
    content_value: &Value,
    metrics_value: &Value,
    entry_action_date: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> EntryScores {
    let content = ContentSnapshot::from_value(content_value);
    let metrics = MetricsSnapshot::from_value(metrics_value);

    EntryScores {
        hot_score: legacy::compute_legacy(
            kind,
            &content,
            &metrics,
            entry_action_date,
            now,
            config,
        ),
        hot_score_v2: compute(kind, &content, &metrics, entry_action_date, now, config)
            .final_score,
    }
}
