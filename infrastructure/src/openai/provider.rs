//! `AiProvider` backed by the OpenAI REST API.

use super::error::OpenAiError;
use super::sse::{SseDecoder, SseFrame};
use super::types::{
    ApiErrorBody, ChatCompletionChunk, ChatCompletionRequest, ChatMessage,
    ImageGenerationRequest, ImageGenerationResponse, TranscriptionResponse,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use futures::StreamExt;
use relay_application::{AiProvider, ProviderError, StreamHandle};
use relay_domain::{StreamEvent, Turn};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const STREAM_BUFFER: usize = 64;

/// Connection and model settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Proxy every request is routed through
    pub proxy: Option<String>,
    /// API root without trailing slash, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub chat_model: String,
    pub max_tokens: u32,
    pub image_size: String,
    pub transcription_model: String,
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiError> {
        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|_| OpenAiError::InvalidProxy(proxy.clone()))?;
            builder = builder.proxy(proxy);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Pass successful responses through, turn the rest into `Api` errors.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, OpenAiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(OpenAiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn open_chat_stream(&self, history: &[Turn]) -> Result<reqwest::Response, OpenAiError> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages: history.iter().map(ChatMessage::from).collect(),
            max_tokens: self.config.max_tokens,
            stream: true,
        };
        debug!(model = %self.config.chat_model, turns = history.len(), "Requesting chat completion");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn create_image(&self, prompt: &str) -> Result<Vec<u8>, OpenAiError> {
        let request = ImageGenerationRequest {
            prompt,
            n: 1,
            size: &self.config.image_size,
            response_format: "b64_json",
        };
        debug!(size = %self.config.image_size, "Requesting image generation");

        let response = self
            .client
            .post(self.url("images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body: ImageGenerationResponse = Self::check(response).await?.json().await?;

        let encoded = body
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or(OpenAiError::Empty("image data"))?;
        Ok(BASE64_STANDARD.decode(encoded)?)
    }

    async fn create_transcription(&self, audio: &Path) -> Result<String, OpenAiError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        debug!(file = %file_name, bytes = bytes.len(), "Requesting transcription");

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        let body: TranscriptionResponse = Self::check(response).await?.json().await?;
        Ok(body.text)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, OpenAiError>>,
) -> Result<T, ProviderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = fut => result.map_err(ProviderError::from),
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn stream_chat(
        &self,
        history: &[Turn],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, ProviderError> {
        let response = cancellable(&cancel, self.open_chat_stream(history)).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(pump_chat_stream(response, tx, cancel));
        Ok(StreamHandle::new(rx))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, ProviderError> {
        cancellable(&cancel, self.create_image(prompt)).await
    }

    async fn transcribe(
        &self,
        audio: &Path,
        cancel: CancellationToken,
    ) -> Result<String, ProviderError> {
        cancellable(&cancel, self.create_transcription(audio)).await
    }
}

/// Read the SSE body and forward it as [`StreamEvent`]s until `[DONE]`, an
/// error, cancellation, or the receiver going away.
async fn pump_chat_stream(
    response: reqwest::Response,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tx.closed() => return,
            chunk = body.next() => chunk,
        };

        let frames = match chunk {
            Some(Ok(bytes)) => decoder.push(&bytes),
            Some(Err(e)) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
            None => {
                // Without [DONE] the receiver sees the channel close.
                let frames: Vec<SseFrame> = decoder.finish().into_iter().collect();
                deliver(&tx, frames).await;
                return;
            }
        };

        if deliver(&tx, frames).await == Flow::Stop {
            return;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

async fn deliver(tx: &mpsc::Sender<StreamEvent>, frames: Vec<SseFrame>) -> Flow {
    for frame in frames {
        let Some(event) = frame_to_event(frame) else {
            continue;
        };
        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            return Flow::Stop;
        }
    }
    Flow::Continue
}

fn frame_to_event(frame: SseFrame) -> Option<StreamEvent> {
    let data = match frame {
        SseFrame::Done => return Some(StreamEvent::Completed),
        SseFrame::Data(data) => data,
    };

    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&data) {
        return Some(StreamEvent::Error(body.error.message));
    }

    match serde_json::from_str::<ChatCompletionChunk>(&data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::Delta),
        Err(e) => {
            trace!(data = %data, "Unreadable stream chunk");
            Some(StreamEvent::Error(format!("unreadable stream chunk: {e}")))
        }
    }
}
