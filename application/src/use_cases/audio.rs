//! Audio transcription.
//!
//! The audio payload is spooled to a uniquely named file under the
//! configured audio directory, handed to the provider, and the file is
//! removed when the spool guard drops, whether transcription succeeded or
//! not. The transcript replaces the payload and the request goes back
//! through normal dispatch.

use crate::ports::transcript::TranscriptEvent;
use crate::use_cases::shared::{RelayContext, RelayError, RequestScope};
use relay_domain::InboundRequest;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info};

/// Extension used when the payload type names no usable format.
const FALLBACK_EXTENSION: &str = "bin";

pub struct AudioHandler<'a> {
    ctx: &'a RelayContext,
}

impl<'a> AudioHandler<'a> {
    pub fn new(ctx: &'a RelayContext) -> Self {
        Self { ctx }
    }

    /// Turn an audio request into a text request.
    pub async fn transcribe(
        &self,
        mut request: InboundRequest,
        scope: &RequestScope,
    ) -> Result<InboundRequest, RelayError> {
        let key = request.topic.clone();
        let audio = request.payload.take().unwrap_or_default();
        let size = audio.len();

        let spooled = spool(&self.ctx.config.audio_dir, &request.payload_type, audio).await?;
        debug!(session = %key, path = %spooled.display(), "Audio spooled");

        let transcript = scope
            .bound(self.ctx.provider.transcribe(&spooled, scope.token()))
            .await
            .map_err(|e| RelayError::from_provider(e, RelayError::Transcription));
        drop(spooled);
        let transcript = transcript?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(RelayError::EmptyTranscript);
        }

        info!(
            session = %key,
            size_kb = size / 1024,
            format = %request.payload_type,
            "Audio transcribed"
        );
        self.ctx.record(
            TranscriptEvent::AudioTranscribed,
            &key,
            json!({
                "bytes": size,
                "format": &request.payload_type,
                "transcript": &transcript,
            }),
        );

        Ok(request.with_transcript(transcript))
    }
}

/// File extension for a payload type such as `m4a` or `audio/wav`.
pub(crate) fn audio_extension(payload_type: &str) -> String {
    let format = payload_type.rsplit('/').next().unwrap_or_default();
    let ext: String = format
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        FALLBACK_EXTENSION.to_string()
    } else {
        ext
    }
}

/// Write `audio` to a fresh file in `dir`. The returned guard deletes it.
async fn spool(dir: &Path, payload_type: &str, audio: Vec<u8>) -> Result<TempPath, RelayError> {
    let dir: PathBuf = dir.to_path_buf();
    let suffix = format!(".{}", audio_extension(payload_type));

    let spooled = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("audio-")
            .suffix(&suffix)
            .tempfile_in(&dir)?;
        file.write_all(&audio)?;
        file.flush()?;
        Ok(file.into_temp_path())
    })
    .await
    .map_err(std::io::Error::other)??;

    Ok(spooled)
}
