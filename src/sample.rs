//! Normalized sample representation
//!
//! A [`Sample`] is the unit of persistence: one point of one series, with the
//! series label set rendered into a single metric identity string and the
//! value rendered as text, matching the three-column layout of the sink.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Label carrying the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// One timestamped sample bound for the sink
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: DateTime<Utc>,
    metric: String,
    value: String,
}

impl Sample {
    /// Create a sample from already-rendered parts
    pub fn new(timestamp: DateTime<Utc>, metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            metric: metric.into(),
            value: value.into(),
        }
    }

    /// Create a sample from a raw wire point
    pub fn from_point(metric: impl Into<String>, timestamp_ms: i64, value: f64) -> Self {
        Self::new(timestamp_from_millis(timestamp_ms), metric, format_value(value))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Convert epoch milliseconds into an instant.
///
/// Millisecond values beyond chrono's representable range are clamped to
/// its bounds.
pub fn timestamp_from_millis(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or(if timestamp_ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Render a sample value as text.
///
/// Finite values use the shortest decimal form that round-trips, without an
/// exponent. Non-finite values use the Prometheus spellings.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Render a label set as a metric identity string.
///
/// `{__name__="cpu", host="a"}` becomes `cpu{host="a"}`. The rendered
/// `label="value"` pairs are sorted as strings, so equal label sets always
/// render identically and match identities already stored by Prometheus
/// tooling (`a0="2"` sorts before `a="1"`).
pub fn render_metric(labels: &BTreeMap<String, String>) -> String {
    let name = labels.get(METRIC_NAME_LABEL);

    let mut pairs: Vec<String> = labels
        .iter()
        .filter(|(label, _)| label.as_str() != METRIC_NAME_LABEL)
        .map(|(label, value)| format!("{}={}", label, quote(value)))
        .collect();
    pairs.sort_unstable();

    match (name, pairs.is_empty()) {
        (Some(name), true) => name.clone(),
        (None, true) => "{}".to_string(),
        (name, false) => format!(
            "{}{{{}}}",
            name.map(String::as_str).unwrap_or_default(),
            pairs.join(", ")
        ),
    }
}

/// Double-quote a label value, escaping it the way Prometheus label sets are
/// printed: C-style escapes, `\xHH` for other ASCII control bytes and
/// `\uHHHH` for other control characters.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\u{07}' => quoted.push_str("\\a"),
            '\u{08}' => quoted.push_str("\\b"),
            '\u{0c}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{0b}' => quoted.push_str("\\v"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_name_only() {
        assert_eq!(render_metric(&labels(&[("__name__", "cpu")])), "cpu");
    }

    #[test]
    fn test_render_sorted_labels() {
        let rendered = render_metric(&labels(&[
            ("zone", "eu"),
            ("__name__", "http_requests_total"),
            ("host", "server1"),
        ]));
        assert_eq!(rendered, r#"http_requests_total{host="server1", zone="eu"}"#);
    }

    #[test]
    fn test_render_without_name() {
        assert_eq!(render_metric(&labels(&[("job", "node")])), r#"{job="node"}"#);
        assert_eq!(render_metric(&BTreeMap::new()), "{}");
    }

    #[test]
    fn test_render_escapes_values() {
        let rendered = render_metric(&labels(&[("__name__", "m"), ("path", "a\"b\\c\n")]));
        assert_eq!(rendered, r#"m{path="a\"b\\c\n"}"#);
    }

    #[test]
    fn test_render_sorts_rendered_pairs() {
        let rendered = render_metric(&labels(&[("__name__", "m"), ("a", "1"), ("a0", "2")]));
        assert_eq!(rendered, r#"m{a0="2", a="1"}"#);
    }

    #[test]
    fn test_render_escapes_control_characters() {
        let rendered = render_metric(&labels(&[
            ("__name__", "m"),
            ("raw", "\u{1}\t\u{7f}\u{85}é"),
        ]));
        assert_eq!(rendered, "m{raw=\"\\x01\\t\\x7f\\u0085é\"}");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(0.7), "0.7");
        assert_eq!(format_value(1_000_000.0), "1000000");
        assert_eq!(format_value(-2.25), "-2.25");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_timestamp_from_millis() {
        assert_eq!(timestamp_from_millis(1000).timestamp_millis(), 1000);
        assert_eq!(timestamp_from_millis(i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(timestamp_from_millis(i64::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_from_point() {
        let sample = Sample::from_point("cpu", 2000, 0.7);
        assert_eq!(sample.metric(), "cpu");
        assert_eq!(sample.value(), "0.7");
        assert_eq!(sample.timestamp().timestamp_millis(), 2000);
    }
}
