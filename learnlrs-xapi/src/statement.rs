//! Canonical xAPI statement model.
//!
//! Types serialize to the JSON shape defined by xAPI 1.0.3: camelCase
//! member names (`objectType`, `homePage`), RFC3339 timestamps, and
//! extension maps keyed by absolute URIs.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;

/// One canonical record of "actor did verb to object".
///
/// Invariants: `actor`, `verb.id` and `object.id` are always present;
/// `id` is unique per statement; `timestamp` is fixed at construction
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: Uuid,
    pub actor: Actor,
    pub verb: Verb,
    pub object: Activity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<XapiResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(with = "rfc3339_secs")]
    pub timestamp: DateTime<Utc>,
}

/// The agent a statement is about.
///
/// Identification goes through an `account` object only: `name` is an
/// opaque per-deployment subject identifier, never a real name or
/// mbox/email. This is the privacy boundary of the whole system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "objectType")]
    pub object_type: String,
    pub account: Account,
}

impl Actor {
    pub fn new(home_page: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_type: "Agent".to_string(),
            account: Account {
                home_page: home_page.into(),
                name: name.into(),
            },
        }
    }
}

/// Account-based agent identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "homePage")]
    pub home_page: String,
    pub name: String,
}

/// A verb: full URI plus a language-tagged display map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verb {
    pub id: String,
    pub display: BTreeMap<String, String>,
}

impl Verb {
    /// Build a verb with a single en-US display string.
    pub fn new(id: impl Into<String>, display: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("en-US".to_string(), display.into());
        Self {
            id: id.into(),
            display: map,
        }
    }
}

/// The activity a statement refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "objectType")]
    pub object_type: String,
}

impl Activity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object_type: "Activity".to_string(),
        }
    }
}

/// Outcome attached to a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct XapiResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

/// Score object: scaled in [-1, 1], raw against optional min/max bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Score {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Score {
    /// A score carrying only a scaled value.
    pub fn scaled(value: f64) -> Self {
        Self {
            scaled: Some(value),
            ..Self::default()
        }
    }

    /// Build a score from a caller-supplied level.
    ///
    /// A mastery band (0-3) maps to `{raw: band, min: 0, max: 3}`; a raw
    /// value maps to `{raw, min: 0, max: score_max}` with `score_max`
    /// defaulting to 100.
    pub fn from_level(level: Level, score_max: Option<f64>) -> Result<Self, ValidationError> {
        match level {
            Level::Band(band) => {
                if band > 3 {
                    return Err(ValidationError::InvalidLevel(band));
                }
                Ok(Self {
                    raw: Some(f64::from(band)),
                    min: Some(0.0),
                    max: Some(3.0),
                    ..Self::default()
                })
            }
            Level::Raw(raw) => Ok(Self {
                raw: Some(raw),
                min: Some(0.0),
                max: Some(score_max.unwrap_or(100.0)),
                ..Self::default()
            }),
        }
    }

    /// Derive a success flag from the raw score and its scale.
    ///
    /// On the 0-3 band scale success means level >= 2; on any other
    /// scale it means raw >= 60% of max. Returns `None` when raw or max
    /// is absent.
    pub fn derived_success(&self) -> Option<bool> {
        let raw = self.raw?;
        let max = self.max?;
        if max == 3.0 {
            Some(raw >= 2.0)
        } else {
            Some(raw >= 0.6 * max)
        }
    }
}

/// Level input for score construction: a mastery band or a raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    /// Integer mastery band, 0 through 3.
    Band(u8),
    /// Raw score measured against a configurable maximum.
    Raw(f64),
}

/// Statement context. Only the platform marker and extensions are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Context {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, serde_json::Value>>,
}

/// RFC3339 with second precision, always UTC ("Z" suffix).
mod rfc3339_secs {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
