//! Slash commands for interactive mode

mod session;
mod stats;
mod stream;

pub use session::{SessionCommand, format_search_results, format_session_list};
pub use stats::format_stats;
pub use stream::StreamCommand;

use delve_app::AppState;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the server)
    Message(String),
    /// Start a fresh conversation
    NewSession,
    /// Open the session picker (TUI) or list sessions (line mode)
    ShowHistory,
    /// Search stored exchanges
    Search(String),
    /// Load a session by id
    Load(String),
    /// Show aggregate counters
    ShowStats,
    /// Turn streaming on/off, or flip it when `None`
    SetStreaming(Option<bool>),
    /// Clear history (asks first)
    ClearHistory,
    /// Reset the server database (asks twice)
    Reset,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, state: &AppState) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    let command = command.to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => CommandResult::NewSession,

        "history" | "sessions" => CommandResult::ShowHistory,

        "search" | "find" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /search <text>".to_string())
            } else {
                CommandResult::Search(args.to_string())
            }
        }

        "load" | "l" => SessionCommand::execute(args, state),

        "stats" => CommandResult::ShowStats,

        "stream" => StreamCommand::execute(args, state.use_streaming),

        "clear" => CommandResult::ClearHistory,

        "reset" => CommandResult::Reset,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

pub fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n             Start a new research session
  /history             Browse past sessions
  /search <text>       Search past queries and responses
  /load, /l <n|id>     Load a session by list number or id
  /stats               Show usage statistics
  /stream [on|off]     Show or set streaming replies
  /clear               Clear research history
  /reset               Reset the server database (asks twice)
  /quit, /exit, /q     Exit delve

Examples:
  /search tokio        Find exchanges mentioning tokio
  /load 2              Load the second session in the history list
  /stream off          Wait for complete replies"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(true)
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(execute_command("hello", &state()), None);
    }

    #[test]
    fn test_aliases() {
        let state = state();
        assert_eq!(execute_command("/new", &state), Some(CommandResult::NewSession));
        assert_eq!(execute_command("/N", &state), Some(CommandResult::NewSession));
        assert_eq!(execute_command("/q", &state), Some(CommandResult::Exit));
        assert_eq!(execute_command("/sessions", &state), Some(CommandResult::ShowHistory));
        assert_eq!(execute_command("/stats", &state), Some(CommandResult::ShowStats));
        assert_eq!(execute_command("/clear", &state), Some(CommandResult::ClearHistory));
        assert_eq!(execute_command("/reset", &state), Some(CommandResult::Reset));
    }

    #[test]
    fn test_search_takes_rest_of_line() {
        assert_eq!(
            execute_command("/search  async rust  ", &state()),
            Some(CommandResult::Search("async rust".to_string()))
        );
        assert!(matches!(
            execute_command("/search", &state()),
            Some(CommandResult::Message(_))
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            execute_command("/Frobnicate now", &state()),
            Some(CommandResult::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_message();
        for name in ["/new", "/history", "/search", "/load", "/stats", "/stream", "/clear", "/reset", "/quit"] {
            assert!(help.contains(name), "missing {}", name);
        }
    }
}
