//! `fabled chat`: run one turn through the relay and stream the reply.
//!
//! The turn runs in-process against the same stores the server uses, so it
//! shows up in `fabled history` afterwards. Ctrl+C cancels the turn; the
//! partial reply is still recorded.

use std::io::Write;

use anyhow::Result;
use console::style;
use uuid::Uuid;

use fabled_core::chat::relay::TurnState;
use fabled_types::chat::{ChatTurnRequest, SYSTEM_ROLE_NAME};

use crate::state::AppState;

pub async fn run_chat(
    state: &AppState,
    session: Option<Uuid>,
    model: String,
    persona: Option<String>,
    message: String,
    json: bool,
) -> Result<()> {
    let session_id = session.unwrap_or_else(Uuid::new_v4);
    if session.is_none() && !json {
        println!("  {} session {}", style("i").blue().bold(), style(session_id).dim());
    }

    let mut stream = state.relay.start(ChatTurnRequest {
        session_id,
        persona_name: persona,
        model,
        user_text: message,
    });

    let mut stdout = std::io::stdout();
    let mut header_printed = false;
    loop {
        let fragment = tokio::select! {
            fragment = stream.next_fragment() => fragment,
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                eprintln!();
                eprintln!("  {}", style("Cancelled.").yellow());
                break;
            }
        };
        let Some(fragment) = fragment else { break };

        if json {
            println!("{}", serde_json::to_string(&fragment)?);
            continue;
        }

        if fragment.role_name == SYSTEM_ROLE_NAME {
            eprintln!();
            eprintln!("  {} {}", style("✗").red().bold(), fragment.text_content);
            continue;
        }

        if !header_printed && !fragment.role_name.is_empty() {
            print!("{} ", style(format!("{}:", fragment.role_name)).cyan().bold());
            header_printed = true;
        }
        print!("{}", fragment.text_content);
        stdout.flush()?;
    }

    let outcome = stream.join().await;
    if !json {
        println!();
    }
    match outcome {
        Some(outcome) if outcome.state == TurnState::Complete => Ok(()),
        Some(outcome) => {
            tracing::debug!(persona = %outcome.persona_name, state = %outcome.state, "Chat turn did not complete");
            anyhow::bail!("chat turn did not complete")
        }
        None => anyhow::bail!("chat turn aborted"),
    }
}
