//! Streamed chat replies.
//!
//! Relays each delta from the provider as a fragment carrying the
//! cumulative text, then commits the full reply to history and sends the
//! finish message. A stream that fails part-way leaves history untouched.

use crate::ports::transcript::TranscriptEvent;
use crate::use_cases::shared::{RelayContext, RelayError, RequestScope};
use relay_domain::util::char_count;
use relay_domain::{InboundRequest, OutboundMessage, Role, StreamEvent};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

/// Result of a completed chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub reply: String,
    pub fragments: usize,
}

pub struct ChatStreamHandler<'a> {
    ctx: &'a RelayContext,
}

impl<'a> ChatStreamHandler<'a> {
    pub fn new(ctx: &'a RelayContext) -> Self {
        Self { ctx }
    }

    /// Stream a reply for `request`. The user turn must already be in
    /// history.
    pub async fn handle(
        &self,
        request: &InboundRequest,
        scope: &RequestScope,
    ) -> Result<ChatOutcome, RelayError> {
        let key = &request.topic;
        let sink = self.ctx.sink(key);
        let history = self.ctx.store.snapshot(key);
        debug!(session = %key, turns = history.len(), "Opening chat stream");

        let started = Instant::now();
        let mut stream = scope
            .bound(self.ctx.provider.stream_chat(&history, scope.token()))
            .await
            .map_err(|e| RelayError::from_provider(e, RelayError::StreamOpen))?;

        let mut reply = String::new();
        let mut fragments = 0usize;
        loop {
            let event = scope
                .bound(async { Ok(stream.next().await) })
                .await
                .map_err(|e| RelayError::from_provider(e, |e| RelayError::Stream(e.to_string())))?;

            match event {
                Some(StreamEvent::Delta(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    reply.push_str(&delta);
                    fragments += 1;
                    sink.send(OutboundMessage::fragment(delta, reply.clone()))
                        .await;
                }
                Some(StreamEvent::Completed) => break,
                Some(StreamEvent::Error(e)) => return Err(RelayError::Stream(e)),
                None => {
                    return Err(RelayError::Stream(
                        "stream closed before completion".to_string(),
                    ));
                }
            }
        }

        if !self.ctx.store.append(key, Role::Assistant, &reply) {
            debug!(session = %key, "Session evicted during reply, not committed");
        }
        sink.send(OutboundMessage::finish()).await;

        let elapsed = started.elapsed();
        let chars = char_count(&reply);
        let chars_per_minute = chars as f64 / elapsed.as_secs_f64().max(0.001) * 60.0;
        info!(
            session = %key,
            chars,
            elapsed_ms = elapsed.as_millis() as u64,
            chars_per_minute = %format!("{chars_per_minute:.2}"),
            "Chat reply completed"
        );
        self.ctx.record(
            TranscriptEvent::ChatCompleted,
            key,
            json!({
                "reply": &reply,
                "fragments": fragments,
                "elapsed_ms": elapsed.as_millis() as u64,
            }),
        );

        Ok(ChatOutcome { reply, fragments })
    }
}
