//! Headline figures extracted from a session's latest result

use crate::rules::SummaryFormat;
use crate::session::SessionDescriptor;
use serde::Serialize;
use serde_json::Value;

/// One titled, pre-formatted figure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryItem {
    pub title: String,
    pub value: String,
}

/// Render the rule's headline fields from `result`; empty for unknown rules
pub fn summarize(descriptor: &SessionDescriptor, result: &Value) -> Vec<SummaryItem> {
    let Some(rule) = descriptor.rule() else {
        return Vec::new();
    };
    rule.summary
        .iter()
        .map(|field| SummaryItem {
            title: field.title.to_string(),
            value: format_value(field.format, result.get(field.key)),
        })
        .collect()
}

fn format_value(format: SummaryFormat, value: Option<&Value>) -> String {
    match format {
        SummaryFormat::Count => value
            .and_then(number)
            .map(|n| n.round() as i64)
            .unwrap_or(0)
            .to_string(),
        SummaryFormat::Seconds => format!("{:.2} sec", value.and_then(number).unwrap_or(0.0)),
        SummaryFormat::Percent => format!("{:.2}%", value.and_then(number).unwrap_or(0.0)),
        SummaryFormat::Text => match value {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "N/A".to_string(),
        },
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dairy_summary() {
        let d = SessionDescriptor::new("s1", "manufacturing", "dairy", "1", "cam");
        let items = summarize(
            &d,
            &json!({
                "white_percentage": 12.345,
                "detection_start_time": "10:02:03",
                "total_detection_time": 7
            }),
        );
        let values: Vec<(&str, &str)> = items.iter().map(|i| (i.title.as_str(), i.value.as_str())).collect();
        assert_eq!(
            values,
            vec![
                ("White Percentage", "12.35%"),
                ("Detection Start Time", "10:02:03"),
                ("Total Detection Time", "7.00 sec"),
            ]
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let d = SessionDescriptor::new("s1", "safety_industry", "safety", "6", "cam");
        let items = summarize(&d, &json!({}));
        assert_eq!(items[0].value, "N/A");
        assert_eq!(items[2].value, "0.00 sec");

        let d = SessionDescriptor::new("s1", "retail", "store_analytics", "1", "cam");
        assert_eq!(summarize(&d, &json!({"person_count": "17"}))[0].value, "17");
        assert_eq!(summarize(&d, &json!({}))[0].value, "0");
    }

    #[test]
    fn test_unknown_rule_has_no_summary() {
        let d = SessionDescriptor::new("s1", "retail", "store_analytics", "9", "cam");
        assert!(summarize(&d, &json!({"person_count": 3})).is_empty());
    }
}
