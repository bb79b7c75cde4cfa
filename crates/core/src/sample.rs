//! Named values recorded during a probe evaluation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single value recorded by a probe.
///
/// Serializes untagged, so a sample renders as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// No value (an absent or `null` output).
    #[default]
    None,
    /// Text value.
    String(String),
    /// Integral number.
    Int(i64),
    /// Non-integral number.
    Double(f64),
    /// Boolean value.
    Bool(bool),
}

impl SampleValue {
    /// Returns `true` if this is [`SampleValue::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow the text, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i16> for SampleValue {
    fn from(value: i16) -> Self {
        Self::Int(value.into())
    }
}

impl From<u16> for SampleValue {
    fn from(value: u16) -> Self {
        Self::Int(value.into())
    }
}

impl From<i32> for SampleValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for SampleValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for SampleValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl<T: Into<SampleValue>> From<Option<T>> for SampleValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// The named outputs of one probe evaluation.
///
/// Names keep the position of their first write; writing an existing name
/// again replaces its value (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    metadata: IndexMap<String, SampleValue>,
}

impl Sample {
    /// Builder form of [`Sample::set`].
    pub fn with<K: Into<String>, V: Into<SampleValue>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    /// Record `value` under `key`, replacing any earlier value.
    pub fn set<K: Into<String>, V: Into<SampleValue>>(&mut self, key: K, value: V) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Look up a value, returning [`SampleValue::None`] for unknown names.
    pub fn get(&self, key: &str) -> &SampleValue {
        self.metadata.get(key).unwrap_or(&SampleValue::None)
    }

    /// Returns `true` if a value was recorded under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Number of distinct names recorded.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Iterate over `(name, value)` pairs in first-write order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleValue)> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<SampleValue>> FromIterator<(K, V)> for Sample {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut sample = Self::default();
        for (k, v) in iter {
            sample.set(k, v);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn missing_keys_read_as_none() {
        let sample = Sample::default();
        assert_eq!(sample.get("nope"), &SampleValue::None);
        assert!(!sample.contains("nope"));
        assert!(sample.is_empty());
    }

    #[test]
    fn last_write_wins_but_keeps_first_position() {
        let mut sample = Sample::default().with("a", 1).with("b", 2);
        sample.set("a", "again");

        assert_eq!(sample.get("a"), &SampleValue::from("again"));
        assert_eq!(sample.len(), 2);
        let names: Vec<_> = sample.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[rstest]
    #[case(SampleValue::from(42), SampleValue::Int(42))]
    #[case(SampleValue::from(1.5), SampleValue::Double(1.5))]
    #[case(SampleValue::from(true), SampleValue::Bool(true))]
    #[case(SampleValue::from("x"), SampleValue::String("x".into()))]
    #[case(SampleValue::from(None::<i32>), SampleValue::None)]
    #[case(SampleValue::from(Some(7u16)), SampleValue::Int(7))]
    fn conversions(#[case] actual: SampleValue, #[case] expected: SampleValue) {
        assert_eq!(actual, expected);
    }

    #[test]
    fn serializes_as_flat_object() {
        let sample = Sample::default()
            .with("status", 200)
            .with("ok", true)
            .with("body", "fine")
            .with("empty", SampleValue::None);

        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"status":200,"ok":true,"body":"fine","empty":null}"#
        );
    }

    #[test]
    fn integral_json_numbers_read_back_as_ints() {
        let sample: Sample = serde_json::from_str(r#"{"a":3,"b":2.5,"c":null}"#).unwrap();
        assert_eq!(sample.get("a"), &SampleValue::Int(3));
        assert_eq!(sample.get("b"), &SampleValue::Double(2.5));
        assert_eq!(sample.get("c"), &SampleValue::None);
    }

    #[test]
    fn collects_from_pairs() {
        let sample: Sample = vec![("x", 1), ("y", 2), ("x", 3)].into_iter().collect();
        assert_eq!(sample.get("x"), &SampleValue::Int(3));
        assert_eq!(sample.len(), 2);
    }
}
