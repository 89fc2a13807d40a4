//! Hand-written port doubles shared by the use-case tests.

use crate::config::RelayConfig;
use crate::ports::ai_provider::{AiProvider, ProviderError, StreamHandle};
use crate::ports::publisher::{PublishError, ResponsePublisher};
use crate::ports::session_store::InMemorySessionStore;
use crate::ports::transcript::{TranscriptEntry, TranscriptEvent, TranscriptLogger};
use crate::use_cases::shared::RelayContext;
use async_trait::async_trait;
use relay_domain::{OutboundMessage, Role, SessionKey, SessionPolicy, StreamEvent, Turn};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ==================== Test Mocks ====================

/// Scripted behaviour for one `stream_chat` call.
pub(crate) enum ChatScript {
    OpenFail(ProviderError),
    Events(Vec<StreamEvent>),
    /// Opens the stream and never sends anything.
    Hang,
    /// Streams whatever the test feeds through the paired sender.
    Fed(mpsc::Receiver<StreamEvent>),
}

/// Provider that replays scripted results.
///
/// With no chat script queued it answers `reply:<last user turn>` in two
/// fragments. With no image queued it returns a valid 1x1 PNG.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    chat: Mutex<VecDeque<ChatScript>>,
    images: Mutex<VecDeque<Result<Vec<u8>, ProviderError>>>,
    transcripts: Mutex<VecDeque<Result<String, ProviderError>>>,
    /// Chat requests whose last user turn equals this text hang
    hang_on: Option<String>,
    pub chat_histories: Mutex<Vec<Vec<Turn>>>,
    pub image_prompts: Mutex<Vec<String>>,
    /// Path and contents of each file handed to `transcribe`
    pub transcribed_files: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_chat(self, script: ChatScript) -> Self {
        self.chat.lock().unwrap().push_back(script);
        self
    }

    pub(crate) fn with_image(self, result: Result<Vec<u8>, ProviderError>) -> Self {
        self.images.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn with_transcript(self, result: Result<String, ProviderError>) -> Self {
        self.transcripts.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn with_hang_on(mut self, text: &str) -> Self {
        self.hang_on = Some(text.to_string());
        self
    }

    pub(crate) fn chat_calls(&self) -> usize {
        self.chat_histories.lock().unwrap().len()
    }

    pub(crate) fn image_calls(&self) -> usize {
        self.image_prompts.lock().unwrap().len()
    }
}

fn echo_events(history: &[Turn]) -> Vec<StreamEvent> {
    let last_user = history
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .map(|t| t.content.clone())
        .unwrap_or_default();
    vec![
        StreamEvent::Delta("reply:".to_string()),
        StreamEvent::Delta(last_user),
        StreamEvent::Completed,
    ]
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn stream_chat(
        &self,
        history: &[Turn],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, ProviderError> {
        self.chat_histories.lock().unwrap().push(history.to_vec());
        let hang = self.hang_on.as_deref().is_some_and(|text| {
            history.last().is_some_and(|t| t.role == Role::User && t.content == text)
        });
        let script = if hang {
            Some(ChatScript::Hang)
        } else {
            self.chat.lock().unwrap().pop_front()
        };
        let events = match script {
            Some(ChatScript::OpenFail(e)) => return Err(e),
            Some(ChatScript::Events(events)) => events,
            Some(ChatScript::Fed(rx)) => return Ok(StreamHandle::new(rx)),
            Some(ChatScript::Hang) => {
                let (tx, rx) = mpsc::channel(1);
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    drop(tx);
                });
                return Ok(StreamHandle::new(rx));
            }
            None => echo_events(history),
        };
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            let _ = tx.send(event).await;
        }
        Ok(StreamHandle::new(rx))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        _cancel: CancellationToken,
    ) -> Result<Vec<u8>, ProviderError> {
        self.image_prompts.lock().unwrap().push(prompt.to_string());
        self.images
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(png_bytes()))
    }

    async fn transcribe(
        &self,
        audio: &Path,
        _cancel: CancellationToken,
    ) -> Result<String, ProviderError> {
        let contents = std::fs::read(audio).unwrap_or_default();
        self.transcribed_files
            .lock()
            .unwrap()
            .push((audio.to_path_buf(), contents));
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("no transcript scripted".into())))
    }
}

/// Publisher that forwards every message to a channel.
pub(crate) struct RecordingPublisher {
    tx: mpsc::UnboundedSender<(SessionKey, OutboundMessage)>,
}

#[async_trait]
impl ResponsePublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &SessionKey,
        message: &OutboundMessage,
    ) -> Result<(), PublishError> {
        self.tx
            .send((topic.clone(), message.clone()))
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

pub(crate) type Published = mpsc::UnboundedReceiver<(SessionKey, OutboundMessage)>;

/// Transcript that keeps every entry in memory.
#[derive(Default)]
pub(crate) struct RecordingTranscript {
    pub entries: Mutex<Vec<TranscriptEntry>>,
}

impl RecordingTranscript {
    /// Events recorded for `session`, in order.
    pub(crate) fn events_for(&self, session: &SessionKey) -> Vec<TranscriptEvent> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| &entry.session == session)
            .map(|entry| entry.event)
            .collect()
    }
}

impl TranscriptLogger for RecordingTranscript {
    fn record(&self, entry: TranscriptEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

// ==================== Helpers ====================

pub(crate) fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbaImage::new(1, 1)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub(crate) struct Harness {
    pub ctx: Arc<RelayContext>,
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<InMemorySessionStore>,
    pub transcript: Arc<RecordingTranscript>,
    pub published: Published,
}

pub(crate) fn harness(provider: ScriptedProvider) -> Harness {
    harness_with(provider, SessionPolicy::default(), RelayConfig::default())
}

pub(crate) fn harness_with(
    provider: ScriptedProvider,
    policy: SessionPolicy,
    config: RelayConfig,
) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(InMemorySessionStore::new(policy));
    let transcript = Arc::new(RecordingTranscript::default());
    let (tx, published) = mpsc::unbounded_channel();
    let ctx = RelayContext::new(
        provider.clone(),
        Arc::new(RecordingPublisher { tx }),
        store.clone(),
    )
    .with_config(config)
    .with_transcript(transcript.clone());
    Harness {
        ctx: Arc::new(ctx),
        provider,
        store,
        transcript,
        published,
    }
}

/// Messages published to `topic` up to and including its terminal message.
/// Messages for other topics are discarded.
pub(crate) async fn until_terminal(
    published: &mut Published,
    topic: &SessionKey,
) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    loop {
        let (key, message) = tokio::time::timeout(Duration::from_secs(5), published.recv())
            .await
            .expect("timed out waiting for a terminal message")
            .expect("publisher closed");
        if &key != topic {
            continue;
        }
        let terminal = message.is_terminal();
        messages.push(message);
        if terminal {
            return messages;
        }
    }
}

/// Drain everything already published without waiting.
pub(crate) fn drain(published: &mut Published) -> Vec<(SessionKey, OutboundMessage)> {
    let mut out = Vec::new();
    while let Ok(item) = published.try_recv() {
        out.push(item);
    }
    out
}
