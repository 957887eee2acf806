//! Human-readable hot score calculation breakdowns for API responses.
//!
//! A breakdown is a formatted view of the [`ScoreComputation`] produced by
//! the scoring pipeline itself, so the explained score is always the score
//! that would be stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::snapshot::{ContentSnapshot, MetricsSnapshot};
use super::{compute, ScoreComputation};
use crate::config::{ScoringConfig, SignalWeights};
use crate::db::models::ContentKind;

#[derive(Debug, Clone, Serialize)]
pub struct SignalBreakdown {
    pub raw: f64,
    pub weight: f64,
    pub component: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_multiplier: Option<f64>,
}

/// Per-signal table in canonical order
#[derive(Debug, Clone, Serialize)]
pub struct SignalTable {
    pub altmetric: SignalBreakdown,
    pub bounty: SignalBreakdown,
    pub tip: SignalBreakdown,
    pub peer_review: SignalBreakdown,
    pub upvote: SignalBreakdown,
    pub comment: SignalBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeFactors {
    pub age_hours: f64,
    pub freshness_multiplier: f64,
    pub base_hours: f64,
    pub gravity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Calculation {
    pub engagement_score: f64,
    pub adjusted_engagement: f64,
    pub time_denominator: f64,
    pub raw_score: f64,
    pub final_score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub signal_weights: SignalWeights,
    pub gravity: f64,
    pub base_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub content_kind: String,
    pub equation: String,
    pub steps: Vec<String>,
    pub signals: SignalTable,
    pub time_factors: TimeFactors,
    pub calculation: Calculation,
    pub config_snapshot: ConfigSnapshot,
}

/// Compute the v2 score and render its breakdown in one pass
pub fn breakdown(
    kind: ContentKind,
    content: &ContentSnapshot,
    metrics: &MetricsSnapshot,
    entry_action_date: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> ScoreBreakdown {
    let computation = compute(kind, content, metrics, entry_action_date, now, config);
    ScoreBreakdown::from_computation(&computation, config)
}

impl ScoreBreakdown {
    pub fn from_computation(computation: &ScoreComputation, config: &ScoringConfig) -> Self {
        Self {
            content_kind: String::from(computation.kind),
            equation: format_equation(computation),
            steps: format_steps(computation),
            signals: signal_table(computation),
            time_factors: TimeFactors {
                age_hours: computation.age_hours,
                freshness_multiplier: computation.freshness,
                base_hours: computation.base_hours,
                gravity: computation.gravity,
            },
            calculation: Calculation {
                engagement_score: computation.engagement,
                adjusted_engagement: computation.adjusted,
                time_denominator: computation.denominator,
                raw_score: computation.raw_score,
                final_score: computation.final_score,
            },
            config_snapshot: ConfigSnapshot {
                signal_weights: config.weights.clone(),
                gravity: config.time_decay.gravity,
                base_hours: config.time_decay.base_hours,
            },
        }
    }
}

fn signal_table(computation: &ScoreComputation) -> SignalTable {
    let plain = |name: &str| -> SignalBreakdown {
        let signal = signal_named(computation, name);
        SignalBreakdown {
            raw: signal.raw,
            weight: signal.weight,
            component: signal.component,
            urgent: None,
            urgency_multiplier: None,
        }
    };

    let bounty_signal = signal_named(computation, "bounty");
    let bounty = SignalBreakdown {
        raw: bounty_signal.raw,
        weight: bounty_signal.weight,
        component: bounty_signal.component,
        urgent: Some(computation.bounty_urgent),
        urgency_multiplier: Some(computation.bounty_multiplier),
    };

    SignalTable {
        altmetric: plain("altmetric"),
        bounty,
        tip: plain("tip"),
        peer_review: plain("peer_review"),
        upvote: plain("upvote"),
        comment: plain("comment"),
    }
}

fn signal_named<'c>(
    computation: &'c ScoreComputation,
    name: &str,
) -> &'c super::SignalComponent {
    computation
        .signals
        .iter()
        .find(|signal| signal.name == name)
        .unwrap_or_else(|| panic!("signal {name} missing from computation"))
}

fn format_equation(computation: &ScoreComputation) -> String {
    let components = computation
        .signals
        .iter()
        .map(|signal| format!("{:.1}", signal.component))
        .collect::<Vec<_>>()
        .join(" + ");

    format!(
        "(({components}) * {:.2}) / ({:.1} + {})^{} * 100 = {}",
        computation.freshness,
        computation.age_hours,
        computation.base_hours,
        computation.gravity,
        computation.final_score,
    )
}

fn format_steps(computation: &ScoreComputation) -> Vec<String> {
    let mut steps = vec!["Engagement Components:".to_string()];

    for signal in &computation.signals {
        if signal.name == "bounty" && computation.bounty_urgent {
            steps.push(format!(
                "  {:<12} ln({} + 1) * {} * {} = {:.1} (URGENT)",
                signal.name,
                signal.raw,
                signal.weight,
                computation.bounty_multiplier,
                signal.component,
            ));
        } else {
            steps.push(format!(
                "  {:<12} ln({} + 1) * {} = {:.1}",
                signal.name, signal.raw, signal.weight, signal.component,
            ));
        }
    }

    steps.extend([
        String::new(),
        format!("Engagement Score = {:.1}", computation.engagement),
        format!("Freshness Boost = {:.2}x", computation.freshness),
        format!(
            "Adjusted = {:.1} * {:.2} = {:.1}",
            computation.engagement, computation.freshness, computation.adjusted
        ),
        format!(
            "Time Decay = ({:.1} + {})^{} = {:.1}",
            computation.age_hours,
            computation.base_hours,
            computation.gravity,
            computation.denominator
        ),
        format!(
            "Raw = {:.1} / {:.1} = {:.2}",
            computation.adjusted, computation.denominator, computation.raw_score
        ),
        format!(
            "Final = floor({:.2} * 100) = {}",
            computation.raw_score, computation.final_score
        ),
    ]);

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2025-08-01T12:00:00Z".parse().expect("fixed clock")
    }

    fn snapshots(
        content: serde_json::Value,
        metrics: serde_json::Value,
    ) -> (ContentSnapshot, MetricsSnapshot) {
        (
            ContentSnapshot::from_value(&content),
            MetricsSnapshot::from_value(&metrics),
        )
    }

    #[test]
    fn test_breakdown_matches_computed_score() {
        let cases = [
            (json!({}), json!({})),
            (json!({}), json!({"votes": 5, "replies": 3, "review_metrics": {"count": 1}})),
            (
                json!({"bounties": [{"amount": "429.0000000000", "status": "OPEN",
                    "expiration_date": (now() + Duration::hours(6)).to_rfc3339()}]}),
                json!({"votes": 12}),
            ),
            (json!({"fundraise": {"amount_raised": {"rsc": 500.0}}}), json!({"votes": -4})),
        ];

        for (content_value, metrics_value) in cases {
            let (content, metrics) = snapshots(content_value, metrics_value);
            let config = ScoringConfig::default();
            let action_date = now() - Duration::hours(3);

            let computation = compute(
                ContentKind::Paper,
                &content,
                &metrics,
                action_date,
                now(),
                &config,
            );
            let rendered =
                breakdown(ContentKind::Paper, &content, &metrics, action_date, now(), &config);

            assert_eq!(rendered.calculation.final_score, computation.final_score);
            assert!(rendered
                .equation
                .ends_with(&format!("= {}", computation.final_score)));
        }
    }

    #[test]
    fn test_steps_shape() {
        let (content, metrics) = snapshots(json!({}), json!({"votes": 5}));
        let rendered = breakdown(
            ContentKind::Post,
            &content,
            &metrics,
            now() - Duration::hours(2),
            now(),
            &ScoringConfig::default(),
        );

        assert_eq!(rendered.steps[0], "Engagement Components:");
        // Header, six signal lines, a blank separator, six calculation lines
        assert_eq!(rendered.steps.len(), 14);
        assert!(rendered.steps[5].contains("upvote"));
        assert!(rendered.steps.last().expect("steps").starts_with("Final = floor("));
    }

    #[test]
    fn test_urgent_bounty_marked() {
        let (content, metrics) = snapshots(
            json!({"bounties": [{"amount": "100", "status": "OPEN",
                "expiration_date": (now() + Duration::hours(6)).to_rfc3339()}]}),
            json!({}),
        );
        let rendered = breakdown(
            ContentKind::Bounty,
            &content,
            &metrics,
            now() - Duration::hours(1),
            now(),
            &ScoringConfig::default(),
        );

        let bounty_line = &rendered.steps[2];
        assert!(bounty_line.contains("bounty"));
        assert!(bounty_line.ends_with("(URGENT)"));
        assert_eq!(rendered.signals.bounty.urgent, Some(true));
        assert_eq!(rendered.signals.bounty.urgency_multiplier, Some(1.5));
    }

    #[test]
    fn test_serializes_with_expected_keys() {
        let (content, metrics) = snapshots(json!({}), json!({}));
        let rendered = breakdown(
            ContentKind::Paper,
            &content,
            &metrics,
            now() - Duration::hours(1),
            now(),
            &ScoringConfig::default(),
        );

        let value = serde_json::to_value(&rendered).expect("serializes");
        for key in ["equation", "steps", "signals", "time_factors", "calculation", "config_snapshot"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["signals"]["altmetric"].get("urgent").is_none());
        assert!(value["signals"]["bounty"].get("urgent").is_some());
    }
}
