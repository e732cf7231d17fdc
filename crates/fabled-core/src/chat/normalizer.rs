//! Maps upstream events to client-facing fragments.

use fabled_types::chat::ClientFragment;
use fabled_types::llm::UpstreamEvent;

/// Per-reply normalizer state.
///
/// Upstreams typically send the role only on the first delta; later deltas
/// inherit it.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    role: Option<String>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, event: &UpstreamEvent) -> ClientFragment {
        if event.delta_is_empty() && event.is_final() {
            return ClientFragment::end_of_reply();
        }

        if let Some(role) = event.role.as_deref().filter(|r| !r.is_empty()) {
            self.role = Some(capitalize(role));
        }

        ClientFragment {
            role_name: self.role.clone().unwrap_or_default(),
            text_content: event.content.clone().unwrap_or_default(),
            streaming_complete: event.is_final(),
        }
    }
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
