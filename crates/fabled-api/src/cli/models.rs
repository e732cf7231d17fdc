//! `fabled models`: list the model ids the upstream serves.

use anyhow::{Context, Result};
use console::style;

use fabled_core::llm::upstream::CompletionUpstream;

use crate::state::AppState;

pub async fn list_models(state: &AppState, json: bool) -> Result<()> {
    let models = state
        .upstream
        .list_models()
        .await
        .with_context(|| format!("Failed to list models from {}", state.config.upstream.models_url()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!();
        println!("  {} The upstream reports no models.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for model in &models {
        println!("  {} {}", style("•").dim(), style(model).cyan());
    }
    println!();
    Ok(())
}
