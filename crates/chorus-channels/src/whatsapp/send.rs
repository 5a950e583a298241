//! Outbound helpers: retries, chunking, and Markdown-to-WhatsApp formatting.

use std::time::Duration;

use chorus_core::error::ChorusError;
use tracing::{error, warn};
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

/// Delays between send attempts.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// WhatsApp's per-message text limit, in characters.
pub(super) const MAX_MESSAGE_CHARS: usize = 4096;

/// Send with retries; returns the id WhatsApp assigned to the message.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: waproto::whatsapp::Message,
) -> Result<String, ChorusError> {
    let attempts = RETRY_DELAYS_MS.len();
    let mut last_err = String::new();

    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                last_err = e.to_string();
                if attempt + 1 < attempts {
                    warn!(
                        "whatsapp: send attempt {}/{attempts} failed: {e}, retrying in {delay_ms}ms",
                        attempt + 1
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                } else {
                    error!("whatsapp: send failed after {attempts} attempts: {e}");
                }
            }
        }
    }

    Err(ChorusError::Channel(format!(
        "whatsapp send failed after {attempts} attempts: {last_err}"
    )))
}

/// Split text into chunks of at most `max_chars` characters, preferring to
/// break after a newline.
pub(super) fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while let Some((cut, _)) = rest.char_indices().nth(max_chars) {
        let at = rest[..cut].rfind('\n').map(|i| i + 1).unwrap_or(cut);
        chunks.push(rest[..at].to_string());
        rest = &rest[at..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Convert the Markdown models like to emit into WhatsApp formatting.
///
/// Headers become bold lines, `**bold**` becomes `*bold*`, links become
/// `text (url)`, and horizontal rules are dropped.
pub(super) fn sanitize_for_whatsapp(text: &str) -> String {
    let mut lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-') {
            continue;
        }
        let header = trimmed.trim_start_matches('#');
        if header.len() < trimmed.len() && header.starts_with(' ') {
            lines.push(format!("*{}*", header.trim()));
            continue;
        }
        lines.push(convert_bold(&convert_links(line)));
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn convert_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(mid) = rest.find("](") {
        let Some(open) = rest[..mid].rfind('[') else {
            out.push_str(&rest[..mid + 2]);
            rest = &rest[mid + 2..];
            continue;
        };
        let Some(close) = rest[mid + 2..].find(')').map(|i| mid + 2 + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&rest[open + 1..mid]);
        out.push_str(" (");
        out.push_str(&rest[mid + 2..close]);
        out.push(')');
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn convert_bold(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find("**") {
        let Some(end) = rest[start + 2..].find("**").map(|i| start + 2 + i) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push('*');
        out.push_str(&rest[start + 2..end]);
        out.push('*');
        rest = &rest[end + 2..];
    }
    out.push_str(rest);
    out
}
