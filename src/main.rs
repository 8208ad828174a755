//! wiki-chat - terminal client for a streaming knowledge-base chat
//!
//! Reads questions from stdin, streams answers to stdout. Status lines,
//! notices and logs go to stderr.

use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wiki_chat::{ClientConfig, ConversationController, ConversationState, Notice, ThinkingPhase};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask { text: String, reset_history: bool },
    NewConversation,
    Cancel,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    match line {
        "" => None,
        "/new" => Some(Command::NewConversation),
        "/cancel" => Some(Command::Cancel),
        "/quit" | "/exit" => Some(Command::Quit),
        _ => match line.strip_prefix("/reset ") {
            Some(text) => Some(Command::Ask {
                text: text.trim().to_string(),
                reset_history: true,
            }),
            None => Some(Command::Ask {
                text: line.to_string(),
                reset_history: false,
            }),
        },
    }
}

/// Prints the growth of the open answer since the last snapshot
#[derive(Default)]
struct AnswerPrinter {
    exchange: u64,
    printed: usize,
    phase: ThinkingPhase,
}

impl AnswerPrinter {
    fn render(&mut self, state: &ConversationState, out: &mut impl Write) -> std::io::Result<()> {
        if state.exchanges_started != self.exchange {
            self.exchange = state.exchanges_started;
            self.printed = 0;
        }

        let answer = state.transcript.open_answer();
        if let Some(delta) = answer.get(self.printed..) {
            if !delta.is_empty() {
                write!(out, "{delta}")?;
                out.flush()?;
            }
        }
        self.printed = answer.len();

        if state.phase != self.phase {
            self.phase = state.phase;
            if state.phase == ThinkingPhase::Idle {
                writeln!(out)?;
            } else {
                eprintln!("[{}]", state.phase.label());
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiki_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let mut controller = ConversationController::from_config(&config)?;
    let mut notices = controller.subscribe_notices();
    let mut printer = AnswerPrinter::default();
    let mut stdout = std::io::stdout();

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                match parse_command(&line?) {
                    None => {}
                    Some(Command::Quit) => break,
                    Some(Command::Cancel) => controller.cancel().await,
                    Some(Command::NewConversation) => {
                        controller.new_conversation().await;
                        eprintln!("[new conversation]");
                    }
                    Some(Command::Ask { text, reset_history }) => {
                        // Refusals also arrive as notices
                        if controller.submit_question(text, reset_history).await.is_ok() {
                            printer.render(controller.state(), &mut stdout)?;
                        }
                    }
                }
            }

            () = controller.process_next_signal(), if controller.state().is_in_flight() => {
                printer.render(controller.state(), &mut stdout)?;
            }

            Ok(notice) = notices.recv() => match notice {
                Notice::Error { message } => eprintln!("! {message}"),
                Notice::Rejected { message } => eprintln!("? {message}"),
            },

            _ = tokio::signal::ctrl_c() => {
                if controller.state().is_in_flight() {
                    controller.cancel().await;
                    printer.render(controller.state(), &mut stdout)?;
                } else {
                    break;
                }
            }
        }
    }

    tracing::info!(
        exchanges = controller.state().exchanges_started,
        "Chat client stopped"
    );
    Ok(())
}
