//! Minimal server-sent events reader for `verba watch`

use anyhow::{Context, Result};
use futures::StreamExt;
use verba_core::application::DeliveryEvent;

/// Accumulates `event:`/`data:` lines until a blank line ends the frame
#[derive(Debug, Default)]
pub struct FrameParser {
    // Bytes of the unfinished line; decoded only once the line is complete
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameParser {
    /// Feed raw bytes; returns every frame completed by them as `(name, data)`
    pub fn push(&mut self, chunk: &[u8]) -> Vec<(String, String)> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    let name = self.event.take().unwrap_or_else(|| "message".to_string());
                    frames.push((name, self.data.join("\n")));
                }
                self.event = None;
                self.data.clear();
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // comments (":") and other fields are ignored
        }
        frames
    }
}

/// Stream delivery events from `GET {base}/jobs/{id}/events`, calling `on_event`
/// for each until the terminal one. Returns the terminal event.
pub async fn watch<F>(
    base_url: &str,
    job_id: &str,
    mut on_event: F,
) -> Result<Option<DeliveryEvent>>
where
    F: FnMut(&DeliveryEvent),
{
    let url = format!("{}/jobs/{}/events", base_url.trim_end_matches('/'), job_id);
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?
        .error_for_status()
        .context("Event stream request failed")?;

    let mut parser = FrameParser::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Event stream interrupted")?;
        for (name, data) in parser.push(&chunk) {
            let event = DeliveryEvent::from_parts(&name, &data)
                .with_context(|| format!("Malformed '{name}' event"))?;
            on_event(&event);
            if event.is_terminal() {
                return Ok(Some(event));
            }
        }
    }
    Ok(None)
}
