//! /stream command - show and set reply streaming

use super::CommandResult;

pub struct StreamCommand;

impl StreamCommand {
    pub fn execute(args: &str, current: bool) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "Streaming is {}\nSet with: /stream on|off",
                if current { "on" } else { "off" }
            ));
        }
        match parse_switch(args) {
            Some(enabled) => CommandResult::SetStreaming(Some(enabled)),
            None if args.eq_ignore_ascii_case("toggle") => CommandResult::SetStreaming(None),
            None => CommandResult::Message(format!(
                "Unknown setting: '{}'\nValid settings: on, off, toggle",
                args
            )),
        }
    }
}

fn parse_switch(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_settings() {
        assert_eq!(StreamCommand::execute("on", false), CommandResult::SetStreaming(Some(true)));
        assert_eq!(StreamCommand::execute("OFF", true), CommandResult::SetStreaming(Some(false)));
        assert_eq!(StreamCommand::execute("toggle", true), CommandResult::SetStreaming(None));
    }

    #[test]
    fn test_stream_shows_current() {
        assert_eq!(
            StreamCommand::execute("", true),
            CommandResult::Message("Streaming is on\nSet with: /stream on|off".to_string())
        );
        assert!(matches!(
            StreamCommand::execute("maybe", true),
            CommandResult::Message(msg) if msg.starts_with("Unknown setting")
        ));
    }
}
