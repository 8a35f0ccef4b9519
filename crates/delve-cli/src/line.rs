//! Line-oriented stdin/stdout mode

use chrono::Utc;
use delve_api::Role;
use delve_app::{AppEvent, Controller};
use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use tokio::sync::mpsc;

use crate::commands::{self, CommandResult};

/// Prints controller events as plain text
#[derive(Debug, Default)]
pub struct LinePrinter {
    /// Chars of the current reply already written
    printed: usize,
    /// Whether a submission failed since the last reset
    failed: bool,
}

impl LinePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn handle(&mut self, event: &AppEvent, out: &mut impl Write) -> io::Result<()> {
        match event {
            AppEvent::MessageUpdate { text } => {
                self.write_new_text(text, out)?;
                out.flush()?;
            }
            AppEvent::MessageEnd { text } => {
                self.write_new_text(text, out)?;
                writeln!(out)?;
                self.printed = 0;
            }
            AppEvent::SubmissionFailed { message } => {
                if self.printed > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{}", message)?;
                self.printed = 0;
                self.failed = true;
            }
            AppEvent::Notice { message, .. } => writeln!(out, "{}", message)?,
            AppEvent::SessionLoaded {
                session_id,
                messages,
            } => {
                writeln!(
                    out,
                    "Loaded session {} ({} messages)\n",
                    session_id,
                    messages.len()
                )?;
                for message in messages {
                    match message.role {
                        Role::User => writeln!(out, "> {}\n", message.content)?,
                        _ => writeln!(out, "{}\n", message.content)?,
                    }
                }
            }
            AppEvent::SessionCleared => writeln!(out, "Started a new session.")?,
            AppEvent::StreamingChanged { enabled } => writeln!(
                out,
                "Streaming {}",
                if *enabled { "on" } else { "off" }
            )?,
            AppEvent::ConfirmationCancelled => writeln!(out, "Cancelled.")?,
            _ => {}
        }
        Ok(())
    }

    fn write_new_text(&mut self, text: &str, out: &mut impl Write) -> io::Result<()> {
        let new_text: String = text.chars().skip(self.printed).collect();
        if !new_text.is_empty() {
            write!(out, "{}", new_text)?;
            self.printed += new_text.chars().count();
        }
        Ok(())
    }
}

/// Print events that are already queued
fn drain(
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    printer: &mut LinePrinter,
    out: &mut impl Write,
) -> io::Result<()> {
    while let Ok(event) = rx.try_recv() {
        printer.handle(&event, out)?;
    }
    out.flush()
}

/// Await a controller operation while printing its events as they arrive
async fn drive<F: Future>(
    future: F,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    printer: &mut LinePrinter,
    out: &mut impl Write,
) -> io::Result<F::Output> {
    let mut future = std::pin::pin!(future);
    loop {
        tokio::select! {
            biased;

            output = &mut future => {
                drain(rx, printer, out)?;
                return Ok(output);
            }

            Some(event) = rx.recv() => {
                printer.handle(&event, out)?;
            }
        }
    }
}

fn read_line() -> io::Result<Option<String>> {
    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Send one message, print the reply and return whether it succeeded
pub async fn run_command(controller: &mut Controller, text: &str) -> anyhow::Result<bool> {
    let mut out = io::stdout();
    let mut rx = controller.subscribe();
    let mut printer = LinePrinter::new();

    println!("delve> {}", text);
    println!();

    if let Err(e) = drive(controller.submit(text), &mut rx, &mut printer, &mut out).await? {
        eprintln!("Error: {}", e);
        return Ok(false);
    }
    Ok(!printer.failed())
}

/// Interactive prompt loop on stdin/stdout
pub async fn run_interactive(controller: &mut Controller, base_url: &str) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let mut rx = controller.subscribe();
    let mut printer = LinePrinter::new();

    drive(controller.initialize(), &mut rx, &mut printer, &mut out).await?;

    if io::stderr().is_terminal() {
        eprintln!("delve ({}) {}", base_url, controller.state().session_label());
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        out.flush()?;

        let Some(input) = read_line()? else {
            break;
        };
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(&input, controller.state()) {
            match result {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::NewSession => {
                    controller.start_new_session();
                    drain(&mut rx, &mut printer, &mut out)?;
                }
                CommandResult::ShowHistory => {
                    drive(controller.refresh_history(), &mut rx, &mut printer, &mut out).await?;
                    let state = controller.state();
                    println!(
                        "{}",
                        commands::format_session_list(
                            &state.sessions,
                            state.session_id.as_deref(),
                            Utc::now()
                        )
                    );
                }
                CommandResult::Search(query) => {
                    let found =
                        drive(controller.search(&query), &mut rx, &mut printer, &mut out).await?;
                    if found {
                        println!(
                            "{}",
                            commands::format_search_results(
                                &query,
                                &controller.state().search_results,
                                Utc::now()
                            )
                        );
                    } else {
                        println!("Search failed.");
                    }
                }
                CommandResult::Load(session_id) => {
                    let loaded =
                        drive(controller.load_session(&session_id), &mut rx, &mut printer, &mut out)
                            .await?;
                    if let Err(e) = loaded {
                        println!("Failed to load session: {}", e);
                    }
                }
                CommandResult::ShowStats => {
                    drive(controller.refresh_stats(), &mut rx, &mut printer, &mut out).await?;
                    println!("{}", commands::format_stats(&controller.state().stats));
                }
                CommandResult::SetStreaming(enabled) => {
                    controller.toggle_streaming(enabled);
                    drain(&mut rx, &mut printer, &mut out)?;
                }
                CommandResult::ClearHistory => {
                    controller.request_clear_history();
                    confirm(controller, &mut rx, &mut printer, &mut out).await?;
                }
                CommandResult::Reset => {
                    controller.request_reset();
                    confirm(controller, &mut rx, &mut printer, &mut out).await?;
                }
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        if let Err(e) = drive(controller.submit(&input), &mut rx, &mut printer, &mut out).await? {
            println!("Error: {}", e);
        }
        println!();
    }

    Ok(())
}

/// Ask the pending yes/no questions until the action runs or is declined
async fn confirm(
    controller: &mut Controller,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    printer: &mut LinePrinter,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    drain(rx, printer, out)?;
    loop {
        let Some(pending) = controller.state().pending_confirmation else {
            break;
        };
        print!("{}\n[y/N] ", pending.prompt());
        out.flush()?;
        let yes = read_line()?.is_some_and(|answer| is_yes(&answer));
        drive(controller.answer_confirmation(yes), rx, printer, out).await?;
    }
    Ok(())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use delve_api::{
        ChatBackend, ChatEventStream, ChatReply, ChatRequest, HistoryEntry, HistorySession,
        Message, SearchResult, Stats, stream,
    };
    use delve_app::ControllerConfig;
    use std::sync::Arc;

    /// Backend that answers every chat with the same chunks
    struct ChunkedBackend {
        chunks: Vec<String>,
    }

    #[async_trait]
    impl ChatBackend for ChunkedBackend {
        async fn chat(&self, _request: &ChatRequest) -> delve_api::Result<ChatReply> {
            Ok(ChatReply::default())
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> delve_api::Result<ChatEventStream> {
            let chunks: Vec<std::result::Result<String, std::io::Error>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(stream::consume(futures::stream::iter(chunks)))
        }

        async fn history(&self) -> delve_api::Result<Vec<HistorySession>> {
            Ok(vec![])
        }

        async fn session_history(&self, _session_id: &str) -> delve_api::Result<Vec<HistoryEntry>> {
            Ok(vec![])
        }

        async fn search(&self, _query: &str, _limit: usize) -> delve_api::Result<Vec<SearchResult>> {
            Ok(vec![])
        }

        async fn stats(&self) -> delve_api::Result<Stats> {
            Ok(Stats::default())
        }

        async fn reset(&self) -> delve_api::Result<()> {
            Ok(())
        }

        async fn health(&self) -> delve_api::Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn render(events: &[AppEvent]) -> (String, LinePrinter) {
        let mut printer = LinePrinter::new();
        let mut out = Vec::new();
        for event in events {
            printer.handle(event, &mut out).unwrap();
        }
        (String::from_utf8(out).unwrap(), printer)
    }

    #[test]
    fn test_streamed_reply_prints_only_new_text() {
        let (text, printer) = render(&[
            AppEvent::MessageUpdate { text: "Hel".into() },
            AppEvent::MessageUpdate { text: "Hello".into() },
            AppEvent::MessageEnd { text: "Hello!".into() },
        ]);
        assert_eq!(text, "Hello!\n");
        assert!(!printer.failed());
    }

    #[test]
    fn test_buffered_reply_prints_once() {
        let (text, _) = render(&[AppEvent::MessageEnd { text: "Done".into() }]);
        assert_eq!(text, "Done\n");
    }

    #[test]
    fn test_multibyte_stream() {
        let (text, _) = render(&[
            AppEvent::MessageUpdate { text: "héllo".into() },
            AppEvent::MessageUpdate { text: "héllo wörld".into() },
            AppEvent::MessageEnd { text: "héllo wörld".into() },
        ]);
        assert_eq!(text, "héllo wörld\n");
    }

    #[test]
    fn test_failure_after_partial_text() {
        let (text, printer) = render(&[
            AppEvent::MessageUpdate { text: "part".into() },
            AppEvent::SubmissionFailed {
                message: "Error: boom".into(),
            },
        ]);
        assert_eq!(text, "part\nError: boom\n");
        assert!(printer.failed());
    }

    #[test]
    fn test_loaded_session_transcript() {
        let (text, _) = render(&[AppEvent::SessionLoaded {
            session_id: "s1".into(),
            messages: vec![Message::user("q"), Message::assistant("a")],
        }]);
        assert_eq!(text, "Loaded session s1 (2 messages)\n\n> q\n\na\n\n");
    }

    #[tokio::test]
    async fn test_reply_arriving_in_one_chunk_is_printed() {
        let mut body = "data: {\"type\":\"content\",\"content\":\"x\"}\n".repeat(300);
        body.push_str("data: [DONE]\n");
        let backend = Arc::new(ChunkedBackend { chunks: vec![body] });
        let mut controller = Controller::new(backend, ControllerConfig::default());
        let mut rx = controller.subscribe();
        let mut printer = LinePrinter::new();
        let mut out = Vec::new();

        drive(controller.submit("q"), &mut rx, &mut printer, &mut out)
            .await
            .unwrap()
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.trim_end(), "x".repeat(300));
        assert!(!printer.failed());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }
}
