//! Typed views over the denormalized `content` and `metrics` JSON snapshots
//! stored on each feed entry.
//!
//! Decoding is total: missing keys, nulls, and wrong-typed values collapse
//! to defaults so scoring never fails on a malformed snapshot. Monetary
//! amounts arrive either as JSON numbers or as decimal strings
//! (e.g. "429.0000000000") and both forms are accepted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Content-side snapshot of a feed entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentSnapshot {
    /// Document type tag (e.g. "GRANT", "PREREGISTRATION")
    pub doc_type: Option<String>,

    pub created_date: Option<DateTime<Utc>>,

    pub bounties: Vec<BountySnapshot>,

    pub purchases: Vec<PurchaseSnapshot>,

    pub fundraise: Option<FundraiseSnapshot>,

    pub grant: Option<GrantSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BountySnapshot {
    pub amount: f64,
    pub status: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseSnapshot {
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmountRaised {
    pub rsc: Option<f64>,
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundraiseSnapshot {
    pub amount_raised: AmountRaised,
    pub status: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantSnapshot {
    pub end_date: Option<DateTime<Utc>>,
}

/// Metrics-side snapshot of a feed entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Net vote score; may be negative
    pub votes: Option<i64>,

    /// Total discussion replies, peer reviews included
    pub replies: Option<i64>,

    pub review_metrics: Option<ReviewMetrics>,

    pub altmetric_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewMetrics {
    pub count: i64,
    pub avg: f64,
}

impl ContentSnapshot {
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let bounties = map
            .get("bounties")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(BountySnapshot::from_value).collect())
            .unwrap_or_default();

        let purchases = map
            .get("purchases")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(PurchaseSnapshot::from_value).collect())
            .unwrap_or_default();

        Self {
            doc_type: map.get("type").and_then(Value::as_str).map(str::to_owned),
            created_date: map.get("created_date").and_then(as_datetime),
            bounties,
            purchases,
            fundraise: map.get("fundraise").and_then(FundraiseSnapshot::from_value),
            grant: map.get("grant").and_then(GrantSnapshot::from_value),
        }
    }
}

impl BountySnapshot {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            amount: map.get("amount").and_then(as_f64).unwrap_or(0.0),
            status: map.get("status").and_then(Value::as_str).map(str::to_owned),
            expiration_date: map.get("expiration_date").and_then(as_datetime),
        })
    }
}

impl PurchaseSnapshot {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            amount: map.get("amount").and_then(as_f64).unwrap_or(0.0),
        })
    }
}

impl FundraiseSnapshot {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let amount_raised = map
            .get("amount_raised")
            .and_then(Value::as_object)
            .map(|raised| AmountRaised {
                rsc: raised.get("rsc").and_then(as_f64),
                usd: raised.get("usd").and_then(as_f64),
            })
            .unwrap_or_default();

        Some(Self {
            amount_raised,
            status: map.get("status").and_then(Value::as_str).map(str::to_owned),
            end_date: map.get("end_date").and_then(as_datetime),
        })
    }
}

impl GrantSnapshot {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            end_date: map.get("end_date").and_then(as_datetime),
        })
    }
}

impl MetricsSnapshot {
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let review_metrics = map
            .get("review_metrics")
            .and_then(Value::as_object)
            .map(|review| ReviewMetrics {
                count: review.get("count").and_then(as_i64).unwrap_or(0),
                avg: review.get("avg").and_then(as_f64).unwrap_or(0.0),
            });

        Self {
            votes: map.get("votes").and_then(as_i64),
            replies: map.get("replies").and_then(as_i64),
            review_metrics,
            altmetric_score: map.get("altmetric_score").and_then(as_f64),
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Serializers occasionally emit naive timestamps; treat them as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(DateTime::from_naive_utc_and_offset(midnight, Utc));
    }

    None
}
