//! Image replies for draw requests.
//!
//! The provider's PNG is decoded once to make sure it is a real image, then
//! sent back in a single finish message. Generated images never enter
//! history.

use crate::ports::transcript::TranscriptEvent;
use crate::use_cases::shared::{RelayContext, RelayError, RequestScope};
use image::ImageFormat;
use relay_domain::{InboundRequest, OutboundMessage, SessionKey};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a completed image reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    /// Where the image was archived, when archiving is enabled
    pub archived: Option<PathBuf>,
}

pub struct ImageHandler<'a> {
    ctx: &'a RelayContext,
}

impl<'a> ImageHandler<'a> {
    pub fn new(ctx: &'a RelayContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        request: &InboundRequest,
        scope: &RequestScope,
    ) -> Result<ImageOutcome, RelayError> {
        let key = &request.topic;
        let png = scope
            .bound(self.ctx.provider.generate_image(&request.msg, scope.token()))
            .await
            .map_err(|e| RelayError::from_provider(e, RelayError::Generation))?;

        let (png, width, height) = validate_png(png).await?;
        let bytes = png.len();

        let archived = match &self.ctx.config.image_dir {
            Some(dir) => archive(dir, key, &png).await,
            None => None,
        };

        self.ctx.sink(key).send(OutboundMessage::image(png)).await;

        info!(session = %key, width, height, bytes, "Image reply sent");
        self.ctx.record(
            TranscriptEvent::ImageGenerated,
            key,
            json!({
                "prompt": &request.msg,
                "width": width,
                "height": height,
                "bytes": bytes,
            }),
        );

        Ok(ImageOutcome {
            width,
            height,
            bytes,
            archived,
        })
    }
}

/// Decode off the async runtime. Hands the bytes back with the dimensions.
async fn validate_png(png: Vec<u8>) -> Result<(Vec<u8>, u32, u32), RelayError> {
    let (png, decoded) = tokio::task::spawn_blocking(move || {
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map(|img| (img.width(), img.height()));
        (png, decoded)
    })
    .await
    .map_err(|e| RelayError::InvalidImage(e.to_string()))?;

    let (width, height) = decoded.map_err(|e| RelayError::InvalidImage(e.to_string()))?;
    Ok((png, width, height))
}

/// Best effort. A failed write is logged and the reply still goes out.
async fn archive(dir: &Path, key: &SessionKey, png: &[u8]) -> Option<PathBuf> {
    let path = dir.join(archive_name(key));
    match write_archive(dir, &path, png).await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(session = %key, path = %path.display(), error = %e, "Failed to archive image");
            None
        }
    }
}

async fn write_archive(dir: &Path, path: &Path, png: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, png).await
}

fn archive_name(key: &SessionKey) -> String {
    let topic: String = key
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    format!("{topic}-{stamp}.png")
}
