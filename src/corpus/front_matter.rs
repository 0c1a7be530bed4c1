//! Typed accessors over parsed front-matter.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::GeoPoint;

/// Keys the graph builder interprets; everything else is carried as extra metadata.
pub const KNOWN_KEYS: &[&str] = &[
    "kind",
    "type",
    "confidence",
    "title",
    "description",
    "summary",
    "timestamp",
    "date",
    "created",
    "tags",
    "latitude",
    "longitude",
    "lat",
    "lng",
    "lon",
    "coordinates",
];

/// Parsed front-matter block: a string-keyed map of JSON-like values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontMatter(BTreeMap<String, Value>);

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML block. Returns the YAML error message on failure.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_yaml::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::default()),
            other => Err(format!("front-matter must be a mapping, found {other}")),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-empty, trimmed string value of the first present key.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| match self.0.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        })
    }

    /// Numeric value; strings are not coerced.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Tags as an ordered list. Accepts a YAML sequence or a comma-separated string.
    pub fn tags(&self) -> Vec<String> {
        match self.0.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// First parseable value of `timestamp`, `date` or `created`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        ["timestamp", "date", "created"]
            .iter()
            .find_map(|k| self.0.get(*k).and_then(parse_timestamp))
    }

    /// Coordinates from `latitude`/`longitude`, `lat`/`lng`|`lon`, or `coordinates: [lat, lon]`.
    pub fn location(&self) -> Option<GeoPoint> {
        let pair = match (self.number("latitude"), self.number("longitude")) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => match (self.number("lat"), self.number("lng").or(self.number("lon"))) {
                (Some(lat), Some(lon)) => Some((lat, lon)),
                _ => match self.0.get("coordinates") {
                    Some(Value::Array(xs)) if xs.len() == 2 => {
                        xs[0].as_f64().zip(xs[1].as_f64())
                    }
                    _ => None,
                },
            },
        };
        pair.filter(|(lat, lon)| (-90.0..=90.0).contains(lat) && (-180.0..=180.0).contains(lon))
            .map(|(lat, lon)| GeoPoint { lat, lon })
    }

    /// Every entry not in [`KNOWN_KEYS`].
    pub fn extra(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        _ => None,
    }
}
