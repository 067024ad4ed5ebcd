//! Name filters and content matching shared by the adapters

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static UUID_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid regex")
});

static CONTAINS_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid regex")
});

static TRIGGERED_SEND_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\s*[a-f0-9]{32}$").expect("valid regex"));

static SEND_DEFINITION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_([0-9]{10,})$").expect("valid regex"));

static EVENT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{Event\.([^.}]+)\.").expect("valid regex"));

/// Imports generated by the platform are named by a bare uuid
pub fn is_generated_import(name: &str) -> bool {
    UUID_NAME.is_match(name)
}

/// Filters generated for journeys and result groups
pub fn is_generated_filter(name: &str) -> bool {
    CONTAINS_UUID.is_match(name) || name.starts_with("Activity for result group")
}

/// Triggered sends created by journeys carry a hex hash suffix
pub fn is_generated_triggered_send(name: &str) -> bool {
    TRIGGERED_SEND_SUFFIX.is_match(name)
}

/// One-off user-initiated sends carry a timestamp suffix
pub fn is_generated_send_definition(name: &str) -> bool {
    SEND_DEFINITION_SUFFIX.is_match(name)
}

/// Concatenation of every `content` string anywhere in an asset
pub fn combined_content(asset: &Value) -> String {
    let mut out = String::new();
    collect_content(asset, &mut out);
    out
}

fn collect_content(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(s) if key == "content" => out.push_str(s),
                    _ => collect_content(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_content(item, out)),
        _ => {}
    }
}

/// True when `content` contains any non-empty needle
pub fn mentions_any(content: &str, needles: &[&str]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && content.contains(needle))
}

/// Event definition key from a journey's default email expression,
/// e.g. `{{Event.DEAudience-1234.EmailAddress}}`
pub fn extract_event_key(default_email: &str) -> Option<String> {
    EVENT_KEY
        .captures(default_email)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Journey name usable as an event definition name lookup
///
/// Versioned journey names carry a `[..]` or `{..}` suffix.
pub fn sanitize_journey_name(name: &str) -> &str {
    match name.find(['[', '{']) {
        Some(idx) => name[..idx].trim_end(),
        None => name,
    }
}

/// Identifier as a string, whether the JSON carries a number or a string
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_f64().map(|f| format!("{:.0}", f))),
        _ => None,
    }
}

/// Parse the `createdDate` layouts returned by the event definition API
pub fn parse_created_date(raw: &str) -> Option<DateTime<Utc>> {
    const LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.3f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_names_are_recognized() {
        assert!(is_generated_import("3f2504e0-4f89-11d3-9a0c-0305e82c3301"));
        assert!(!is_generated_import("Nightly subscribers"));

        assert!(is_generated_filter("Filter 3f2504e0-4f89-11d3-9a0c-0305e82c3301"));
        assert!(is_generated_filter("Activity for result group 4"));
        assert!(!is_generated_filter("VIP customers"));

        assert!(is_generated_triggered_send(
            "Welcome - 0123456789abcdef0123456789abcdef"
        ));
        assert!(!is_generated_triggered_send("Welcome"));

        assert!(is_generated_send_definition("Newsletter_1700000000123"));
        assert!(!is_generated_send_definition("Newsletter_2024"));
    }

    #[test]
    fn content_is_collected_recursively() {
        let asset = json!({
            "name": "page",
            "content": "<h1>top</h1>",
            "views": {
                "html": { "content": "<p>html</p>", "slots": { "a": { "content": "slot" } } },
                "text": { "content": 42 }
            },
            "blocks": [{ "content": "block" }]
        });
        let combined = combined_content(&asset);
        for part in ["<h1>top</h1>", "<p>html</p>", "slot", "block"] {
            assert!(combined.contains(part), "missing {part}");
        }
        assert!(!combined.contains("page"));
    }

    #[test]
    fn empty_needles_never_match() {
        assert!(mentions_any("SELECT * FROM Orders", &["", "Orders"]));
        assert!(!mentions_any("SELECT * FROM Orders", &["", ""]));
    }

    #[test]
    fn event_key_and_journey_name() {
        assert_eq!(
            extract_event_key("{{Event.DEAudience-abc.EmailAddress}}").as_deref(),
            Some("DEAudience-abc")
        );
        assert_eq!(extract_event_key("{{Contact.Attribute.Email}}"), None);

        assert_eq!(sanitize_journey_name("Welcome [v2]"), "Welcome");
        assert_eq!(sanitize_journey_name("Onboarding {copy}"), "Onboarding");
        assert_eq!(sanitize_journey_name("Plain"), "Plain");
    }

    #[test]
    fn ids_accept_numbers_and_strings() {
        assert_eq!(id_string(&json!(12345)).as_deref(), Some("12345"));
        assert_eq!(id_string(&json!(12345.0)).as_deref(), Some("12345"));
        assert_eq!(id_string(&json!("678")).as_deref(), Some("678"));
        assert_eq!(id_string(&json!("")), None);
        assert_eq!(id_string(&json!(null)), None);
    }

    #[test]
    fn created_dates_in_every_layout() {
        let a = parse_created_date("2024-03-01T10:00:00.000").unwrap();
        let b = parse_created_date("2024-03-01T10:00:00").unwrap();
        let c = parse_created_date("2024-03-01T10:00:00.00").unwrap();
        let d = parse_created_date("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
        assert!(parse_created_date("yesterday").is_none());
    }
}
