//! Notification message rendering.

use crate::config::Config;
use crate::record::{Kind, StoredRecord};
use lazy_static::lazy_static;
use std::time::Duration;
use time::macros::format_description;

/// Records longer than this many characters are truncated before being sent.
pub const MAX_RECORD_CHARS: usize = 500;

const MARKDOWN_SPECIAL: [char; 17] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '!',
];

lazy_static! {
    static ref TIME_FORMATTER: &'static [time::format_description::FormatItem<'static>] =
        format_description!(version = 2, "[year]-[month]-[day] [hour]:[minute]:[second] UTC");
}

#[must_use]
pub fn detection_title(kind: Kind) -> String {
    format!("*🔥 Detected {kind} log*")
}

/// Render the Markdown body announcing a stored record.
#[must_use]
pub fn detection(record: &StoredRecord) -> String {
    // NB: unwrap_or_else covers the only failure, a date outside the formattable range.
    let time = record
        .created_at
        .format(*TIME_FORMATTER)
        .unwrap_or_else(|_| record.created_at.to_string());
    let text = escape_markdown(&truncate_record(&record.record));
    format!(
        "📝 *Record:* `{text}`\n\
         🤖 *IP Address:* `{ip}`\n\
         📍 *Location:* `{location}`\n\
         ⏰ *Time:* `{time}`\n\
         \n\
         *#{kind}*\n",
        ip = record.ip,
        location = record.location,
        kind = record.kind,
    )
}

/// Render the message announcing that capture is up, listing the payload patterns.
#[must_use]
pub fn startup(version: &str, config: &Config) -> String {
    let bases: Vec<&str> = config
        .http_log
        .iter()
        .map(|base| base.trim_end_matches('/'))
        .collect();
    let http_log: String = bases
        .iter()
        .map(|base| format!("`{base}/httplog/{{payload}}`\n"))
        .collect();
    let exchange_log: String = bases
        .iter()
        .map(|base| {
            format!("`{base}/users/login?username={{username}}&password={{password}}`\n")
        })
        .collect();

    format!(
        "*🔥 DNS&HTTP Log initialized successfully*\n\n\
         *⚙️ Version: {version}*\n\n\
         *⏲️ Interval: {interval}*\n\n\
         🌐 *HTTP log*\n\
         {http_log}\
         \n🌐 *Exchange log*\n\
         {exchange_log}\
         \n🕸 *DNS log*\n\
         `{{payload}}.{domain}`\n",
        interval = format_interval(config.notify.interval),
        domain = config.domain,
    )
}

fn format_interval(interval: Duration) -> String {
    format!("{}s", interval.as_secs())
}

/// Truncate `record` to [`MAX_RECORD_CHARS`] characters, marking the cut with `...`.
#[must_use]
pub fn truncate_record(record: &str) -> String {
    match record.char_indices().nth(MAX_RECORD_CHARS) {
        Some((cut, _)) => format!("{}...", &record[..cut]),
        None => record.to_string(),
    }
}

/// Backslash-escape each Markdown special character in a single pass.
///
/// Not idempotent: escaping an escaped string escapes the escapes' targets again.
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Interaction, NewRecord};
    use time::macros::datetime;

    #[test]
    fn escapes_every_special_character() {
        assert_eq!(
            escape_markdown("_*[]()~`>#+-=|{}!"),
            r"\_\*\[\]\(\)\~\`\>\#\+\-\=\|\{\}\!"
        );
        assert_eq!(
            escape_markdown("version 13.10.1_20231115"),
            "version 13.10.1\\_20231115"
        );
        assert_eq!(
            escape_markdown("This is not a *bold text"),
            "This is not a \\*bold text"
        );
    }

    #[test]
    fn escaping_twice_is_not_a_no_op() {
        let once = escape_markdown("a_b");
        assert_eq!(once, "a\\_b");
        assert_eq!(escape_markdown(&once), "a\\\\_b");
    }

    #[test]
    fn backslash_is_not_special() {
        assert_eq!(escape_markdown(r"C:\temp"), r"C:\temp");
    }

    #[test]
    fn truncates_long_records() {
        let long = "x".repeat(600);
        let truncated = truncate_record(&long);
        assert_eq!(truncated.len(), 503);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("..."));

        let exact = "y".repeat(500);
        assert_eq!(truncate_record(&exact), exact);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(501);
        let truncated = truncate_record(&long);
        assert_eq!(truncated.chars().count(), 503);
        assert!(truncated.starts_with(&"é".repeat(500)));
    }

    #[test]
    fn renders_detection() {
        let stored = StoredRecord::from_new(
            1,
            datetime!(2024-06-01 12:00 UTC),
            NewRecord::new(
                Interaction::Http {
                    path: "config".to_string(),
                },
                "1.2.3.4".parse().unwrap(),
                "Lab".to_string(),
            ),
        );
        let body = detection(&stored);
        assert!(body.contains("📝 *Record:* `config`"));
        assert!(body.contains("🤖 *IP Address:* `1.2.3.4`"));
        assert!(body.contains("📍 *Location:* `Lab`"));
        assert!(body.contains("⏰ *Time:* `2024-06-01 12:00:00 UTC`"));
        assert!(body.ends_with("*#HTTP*\n"));
        assert_eq!(detection_title(Kind::Dns), "*🔥 Detected DNS log*");
    }

    #[test]
    fn renders_startup() {
        let config = Config::try_from_str(
            r#"{
                "domain": "oob.example.com",
                "api_bind_addr": "127.0.0.1:8080",
                "http_log": ["https://cap.example.net/"],
                "notify": { "bot_token": "t", "chat_id": "1", "interval": 10 },
                "exchange": { "endpoint": "https://mail.example.com/autodiscover/autodiscover.xml" }
            }"#,
        )
        .unwrap();
        let msg = startup("1.2.3", &config);
        assert_eq!(
            msg,
            "*🔥 DNS&HTTP Log initialized successfully*\n\n\
             *⚙️ Version: 1.2.3*\n\n\
             *⏲️ Interval: 10s*\n\n\
             🌐 *HTTP log*\n\
             `https://cap.example.net/httplog/{payload}`\n\
             \n🌐 *Exchange log*\n\
             `https://cap.example.net/users/login?username={username}&password={password}`\n\
             \n🕸 *DNS log*\n\
             `{payload}.oob.example.com`\n"
        );
        assert!(msg.contains("Version: 1.2.3"));
        assert!(msg.contains("Interval: 10s"));
        assert!(msg.contains("`https://cap.example.net/httplog/{payload}`"));
        assert!(msg.contains(
            "`https://cap.example.net/users/login?username={username}&password={password}`"
        ));
        assert!(msg.contains("`{payload}.oob.example.com`"));
    }
}
