//! `fabled history`: print the conversation recorded for a session.

use anyhow::Result;
use console::style;
use uuid::Uuid;

use fabled_core::repository::conversation::ConversationRepository;
use fabled_types::conversation::{ConversationEntry, Sender};
use fabled_types::persona::DEFAULT_PERSONA_NAME;

use crate::state::AppState;

pub async fn show_history(
    state: &AppState,
    session_id: Uuid,
    persona: Option<&str>,
    json: bool,
) -> Result<()> {
    let persona = persona.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PERSONA_NAME);
    let entries = state.conversations.history(&session_id, persona).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!(
            "  {} No conversation for session {} with persona '{}'.",
            style("i").blue().bold(),
            style(session_id).dim(),
            style(persona).cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    for entry in &entries {
        print_entry(entry, persona);
    }
    println!();
    Ok(())
}

fn print_entry(entry: &ConversationEntry, persona: &str) {
    let time = entry.message_time.format("%Y-%m-%d %H:%M:%S");
    let speaker = match entry.sender {
        Sender::User => style("you".to_string()).green().bold(),
        Sender::Assistant => style(persona.to_string()).cyan().bold(),
        Sender::System => style("system".to_string()).yellow().bold(),
    };
    println!("  {} {}", style(time).dim(), speaker);
    for line in entry.content.lines() {
        println!("    {line}");
    }
}
