//! Helpers shared by the `atrium` binary.

use anyhow::Context;
use atrium_core::models::TelegramLog;

/// Initialize tracing on stderr so stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,atrium=info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse `1,2, 3` into ids. Empty input is an empty list.
pub fn parse_id_list(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid category id: {}", s))
        })
        .collect()
}

pub fn format_log_line(log: &TelegramLog) -> String {
    let keyword = log
        .matched_keyword
        .as_deref()
        .map(|k| format!(" [{}]", k))
        .unwrap_or_default();
    let error = log
        .error
        .as_deref()
        .map(|e| format!(" ({})", truncate_string(e, 60)))
        .unwrap_or_default();

    format!(
        "{} #{} {:?} {:?} chat={}{} {}{}",
        log.created_at.format("%Y-%m-%d %H:%M:%S"),
        log.id,
        log.direction,
        log.status,
        log.chat_id,
        keyword,
        truncate_string(&log.text, 80),
        error
    )
}

/// Logs newer than `last_seen`, oldest first. Input is newest first.
pub fn unseen_logs(logs: Vec<TelegramLog>, last_seen: Option<i64>) -> Vec<TelegramLog> {
    let mut fresh: Vec<TelegramLog> = logs
        .into_iter()
        .filter(|log| last_seen.map_or(true, |seen| log.id > seen))
        .collect();
    fresh.reverse();
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::models::{TelegramDirection, TelegramStatus};
    use chrono::Utc;

    fn log(id: i64) -> TelegramLog {
        TelegramLog {
            id,
            direction: TelegramDirection::Inbound,
            chat_id: "42".to_string(),
            text: "urgent: call back".to_string(),
            matched_keyword: Some("urgent".to_string()),
            status: TelegramStatus::Sent,
            error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn id_lists() {
        assert_eq!(parse_id_list("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("1,x").is_err());
    }

    #[test]
    fn unseen_logs_are_oldest_first() {
        let logs = vec![log(9), log(8), log(7)];
        let ids: Vec<i64> = unseen_logs(logs.clone(), Some(7)).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![8, 9]);
        assert_eq!(unseen_logs(logs, None).len(), 3);
    }

    #[test]
    fn log_line_mentions_keyword() {
        let line = format_log_line(&log(3));
        assert!(line.contains("#3"));
        assert!(line.contains("[urgent]"));
    }
}
