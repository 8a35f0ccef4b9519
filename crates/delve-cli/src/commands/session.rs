//! /load command and session listings

use super::CommandResult;
use chrono::{DateTime, Utc};
use delve_api::{HistorySession, SearchResult};
use delve_app::{AppState, format_server_time, session_detail, session_title};
use delve_tui::widgets::history_panel::truncate;

pub struct SessionCommand;

impl SessionCommand {
    /// Resolve a list number, full id or unique id prefix to a session
    pub fn execute(args: &str, state: &AppState) -> CommandResult {
        if args.is_empty() {
            return CommandResult::ShowHistory;
        }

        if let Ok(index) = args.parse::<usize>() {
            return match index.checked_sub(1).and_then(|i| state.sessions.get(i)) {
                Some(session) => CommandResult::Load(session.session_id.clone()),
                None => CommandResult::Message(format!(
                    "No session #{}. Use /history to list sessions.",
                    index
                )),
            };
        }

        if state.sessions.iter().any(|s| s.session_id == args) {
            return CommandResult::Load(args.to_string());
        }

        let matches: Vec<&HistorySession> = state
            .sessions
            .iter()
            .filter(|s| s.session_id.starts_with(args))
            .collect();
        match matches.as_slice() {
            [session] => CommandResult::Load(session.session_id.clone()),
            [] => CommandResult::Load(args.to_string()),
            _ => CommandResult::Message(format!(
                "'{}' matches {} sessions; use more characters.",
                args,
                matches.len()
            )),
        }
    }
}

/// Numbered session list for line mode
pub fn format_session_list(
    sessions: &[HistorySession],
    current: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    if sessions.is_empty() {
        return "No research history yet".to_string();
    }

    let mut output = String::from("Sessions:\n\n");
    for (i, session) in sessions.iter().enumerate() {
        let marker = if current == Some(session.session_id.as_str()) {
            " *"
        } else {
            ""
        };
        output.push_str(&format!(
            "  {:>2}. {}{}\n      {} · {}\n",
            i + 1,
            truncate(&session_title(session), 60),
            marker,
            session_detail(session, now),
            session.session_id
        ));
    }
    output.push_str("\nLoad with: /load <number>");
    output
}

/// Search results for line mode
pub fn format_search_results(query: &str, results: &[SearchResult], now: DateTime<Utc>) -> String {
    if results.is_empty() {
        return format!("No results for \"{}\"", query);
    }

    let mut output = format!("Results for \"{}\":\n\n", query);
    for result in results {
        let when = result
            .created_at
            .as_deref()
            .map(|raw| format_server_time(raw, now))
            .unwrap_or_default();
        output.push_str(&format!(
            "  {}\n    {}\n    {} · {}\n",
            truncate(&result.query, 70),
            truncate(&result.preview(), 70),
            when,
            result.session_id
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(id: &str, last_query: &str) -> HistorySession {
        HistorySession {
            session_id: id.into(),
            created_at: None,
            updated_at: Some("2024-06-15 11:00:00".into()),
            query_count: 2,
            last_query: Some(last_query.into()),
        }
    }

    fn state() -> AppState {
        let mut state = AppState::new(true);
        state.sessions = vec![
            session("aaaa-1111", "first"),
            session("aaab-2222", "second"),
            session("bbbb-3333", "third"),
        ];
        state
    }

    #[test]
    fn test_load_by_number() {
        let state = state();
        assert_eq!(
            SessionCommand::execute("2", &state),
            CommandResult::Load("aaab-2222".into())
        );
        assert!(matches!(
            SessionCommand::execute("0", &state),
            CommandResult::Message(_)
        ));
        assert!(matches!(
            SessionCommand::execute("4", &state),
            CommandResult::Message(_)
        ));
    }

    #[test]
    fn test_load_by_id_or_prefix() {
        let state = state();
        assert_eq!(
            SessionCommand::execute("bbbb-3333", &state),
            CommandResult::Load("bbbb-3333".into())
        );
        assert_eq!(
            SessionCommand::execute("bb", &state),
            CommandResult::Load("bbbb-3333".into())
        );
        assert!(matches!(
            SessionCommand::execute("aaa", &state),
            CommandResult::Message(msg) if msg.contains("matches 2 sessions")
        ));
        assert_eq!(
            SessionCommand::execute("unknown-id", &state),
            CommandResult::Load("unknown-id".into())
        );
    }

    #[test]
    fn test_load_without_args_lists() {
        assert_eq!(SessionCommand::execute("", &state()), CommandResult::ShowHistory);
    }

    #[test]
    fn test_format_session_list() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let state = state();
        let text = format_session_list(&state.sessions, Some("aaab-2222"), now);
        assert!(text.contains("   1. first\n"));
        assert!(text.contains("   2. second *\n"));
        assert!(text.contains("2 queries · 1h ago · bbbb-3333"));
        assert_eq!(format_session_list(&[], None, now), "No research history yet");
    }

    #[test]
    fn test_format_search_results() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let results = vec![SearchResult {
            id: Some(1),
            session_id: "s1".into(),
            query: "what is tokio".into(),
            response: "An async runtime".into(),
            created_at: Some("2024-06-15 11:58:00".into()),
        }];
        let text = format_search_results("tokio", &results, now);
        assert!(text.starts_with("Results for \"tokio\""));
        assert!(text.contains("An async runtime..."));
        assert!(text.contains("2m ago · s1"));
        assert_eq!(format_search_results("x", &[], now), "No results for \"x\"");
    }
}
