//! Bus event payloads.
//!
//! # Purpose
//! Defines the closed set of domain events exchanged over the bus. Each topic
//! has exactly one strongly-typed payload variant; anything else decodes to
//! [`Event::Unknown`] so a consumer can log and drop it instead of crashing.
//!
//! The wire form is JSON: `{"event": "<topic>", "data": {...}, "timestamp": ...}`.
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TOPIC_SCORE_CREATED: &str = "score.created";
pub const TOPIC_SCORE_UPDATED: &str = "score.updated";
pub const TOPIC_CACHE_INVALIDATE: &str = "cache.invalidate";

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "score.created")]
    ScoreCreated(ScoreCreated),
    #[serde(rename = "score.updated")]
    ScoreUpdated(ScoreUpdated),
    #[serde(rename = "cache.invalidate")]
    CacheInvalidate(CacheInvalidate),
    /// Catch-all for topics this consumer does not understand. Unknown tags
    /// decode to this variant with their payload ignored; decoding is done by
    /// hand on [`Envelope`] because a derived tagged fallback would reject any
    /// unknown event that carries data.
    Unknown,
}

impl Event {
    /// Bus topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::ScoreCreated(_) => TOPIC_SCORE_CREATED,
            Event::ScoreUpdated(_) => TOPIC_SCORE_UPDATED,
            Event::CacheInvalidate(_) => TOPIC_CACHE_INVALIDATE,
            Event::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreCreated {
    pub score_id: i64,
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreUpdated {
    pub score_id: i64,
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub old_score: i64,
    pub new_score: i64,
}

/// Instruction to evict cache entries: exact keys, glob patterns, or both.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CacheInvalidate {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Wire envelope: the tagged event plus its publication timestamp.
#[derive(Debug, Serialize, Clone)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

/// Untyped wire shape, decoded first so the tag can be inspected before the
/// payload is interpreted. `data` may be any JSON value on unknown tags.
#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let raw = RawEnvelope::deserialize(deserializer)?;
        let event = match raw.event.as_str() {
            TOPIC_SCORE_CREATED => {
                Event::ScoreCreated(serde_json::from_value(raw.data).map_err(D::Error::custom)?)
            }
            TOPIC_SCORE_UPDATED => {
                Event::ScoreUpdated(serde_json::from_value(raw.data).map_err(D::Error::custom)?)
            }
            TOPIC_CACHE_INVALIDATE => {
                Event::CacheInvalidate(serde_json::from_value(raw.data).map_err(D::Error::custom)?)
            }
            _ => Event::Unknown,
        };
        Ok(Self {
            event,
            timestamp: raw.timestamp,
        })
    }
}

impl Envelope {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_carries_topic_tag() {
        let envelope = Envelope::new(Event::ScoreCreated(ScoreCreated {
            score_id: 1,
            user_id: "u1".into(),
            username: "alice".into(),
            game: "doom".into(),
            score: 100,
        }));
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["event"], "score.created");
        assert_eq!(value["data"]["score"], 100);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn round_trips_through_bytes() {
        let envelope = Envelope::new(Event::CacheInvalidate(CacheInvalidate {
            keys: vec!["stats:game:doom".into()],
            patterns: vec!["ranking:doom:*".into()],
        }));
        let bytes = envelope.encode().expect("encode");
        let decoded = Envelope::decode(&bytes).expect("decode");
        assert_eq!(decoded.event, envelope.event);
    }

    #[test]
    fn unknown_topic_decodes_to_unknown_variant() {
        let raw = r#"{"event":"user.created","data":{"userId":"u1"},"timestamp":"2026-01-01T00:00:00Z"}"#;
        let decoded = Envelope::decode(raw.as_bytes()).expect("decode");
        assert_eq!(decoded.event, Event::Unknown);
    }

    #[test]
    fn unknown_topic_without_payload_decodes() {
        let raw = r#"{"event":"user.deleted","timestamp":"2026-01-01T00:00:00Z"}"#;
        let decoded = Envelope::decode(raw.as_bytes()).expect("decode");
        assert_eq!(decoded.event, Event::Unknown);
    }

    #[test]
    fn known_topic_with_malformed_payload_is_an_error() {
        let raw = r#"{"event":"score.created","data":{"score":"high"},"timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(Envelope::decode(raw.as_bytes()).is_err());
    }

    #[test]
    fn invalidate_defaults_missing_fields() {
        let raw = r#"{"event":"cache.invalidate","data":{"keys":["ranking:doom:50"]},"timestamp":"2026-01-01T00:00:00Z"}"#;
        let decoded = Envelope::decode(raw.as_bytes()).expect("decode");
        match decoded.event {
            Event::CacheInvalidate(inv) => {
                assert_eq!(inv.keys, vec!["ranking:doom:50".to_string()]);
                assert!(inv.patterns.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
