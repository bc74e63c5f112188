//! Records and watermarks that flow through the co-reduce operator. A [Record] carries the user
//! value together with its envelope (event time, keys, headers); the envelope is preserved when
//! the operator replaces the value with the mapped output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Identifies one of the two inputs of the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    First,
    Second,
}

impl Input {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Input::First => "1",
            Input::Second => "2",
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input-{}", self.as_str())
    }
}

/// Watermark declares that no record with an earlier event time will arrive on the input that
/// produced it. It is stored as milliseconds since the unix epoch and totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(i64);

impl Watermark {
    pub fn from_timestamp_millis(millis: i64) -> Self {
        Watermark(millis)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// Returns the watermark as a UTC time, `None` if it is outside the range chrono can represent.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl From<i64> for Watermark {
    fn from(millis: i64) -> Self {
        Watermark(millis)
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(time: DateTime<Utc>) -> Self {
        Watermark(time.timestamp_millis())
    }
}

impl From<Watermark> for i64 {
    fn from(watermark: Watermark) -> Self {
        watermark.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value together with the envelope it travelled in.
/// NOTE: the envelope is cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    /// the user payload
    pub value: T,
    /// event time of the record
    pub event_time: DateTime<Utc>,
    /// keys of the record
    pub keys: Arc<[String]>,
    /// headers of the record
    pub headers: Arc<HashMap<String, String>>,
}

impl<T> Record<T> {
    pub fn new(value: T, event_time: DateTime<Utc>) -> Self {
        Self {
            value,
            event_time,
            keys: Arc::new([]),
            headers: Arc::new(HashMap::new()),
        }
    }

    pub fn with_keys(mut self, keys: impl Into<Arc<[String]>>) -> Self {
        self.keys = keys.into();
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Arc::new(headers);
        self
    }

    /// Splits the record into its value and the bare envelope.
    pub fn into_parts(self) -> (T, Record<()>) {
        let Record {
            value,
            event_time,
            keys,
            headers,
        } = self;
        (
            value,
            Record {
                value: (),
                event_time,
                keys,
                headers,
            },
        )
    }

    /// Replaces the value while keeping event time, keys and headers.
    pub fn replace<U>(self, value: U) -> Record<U> {
        Record {
            value,
            event_time: self.event_time,
            keys: self.keys,
            headers: self.headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_keeps_envelope() {
        let event_time = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let headers = HashMap::from([("source".to_string(), "orders".to_string())]);
        let record = Record::new(42_i64, event_time)
            .with_keys(vec!["customer-7".to_string()])
            .with_headers(headers.clone());

        let replaced = record.replace("forty-two".to_string());
        assert_eq!(replaced.value, "forty-two");
        assert_eq!(replaced.event_time, event_time);
        assert_eq!(&*replaced.keys, &["customer-7".to_string()]);
        assert_eq!(&*replaced.headers, &headers);
    }

    #[test]
    fn test_into_parts() {
        let event_time = DateTime::from_timestamp_millis(10).unwrap();
        let (value, envelope) = Record::new("a", event_time).into_parts();
        assert_eq!(value, "a");
        assert_eq!(envelope.event_time, event_time);
        assert_eq!(envelope.replace(1).value, 1);
    }

    #[test]
    fn test_watermark_conversions() {
        let time = DateTime::from_timestamp_millis(1_234).unwrap();
        let wm = Watermark::from(time);
        assert_eq!(wm.timestamp_millis(), 1_234);
        assert_eq!(wm.as_datetime(), Some(time));
        assert_eq!(i64::from(Watermark::from(-5)), -5);
        assert!(Watermark::from(i64::MIN) < Watermark::from(0));
        assert_eq!(Watermark::from(i64::MAX).as_datetime(), None);
        assert_eq!(wm.to_string(), "1234");
    }

    #[test]
    fn test_input_labels() {
        assert_eq!(Input::First.as_str(), "1");
        assert_eq!(Input::Second.to_string(), "input-2");
    }
}
