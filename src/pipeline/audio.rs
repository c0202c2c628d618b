//! Audio extraction from video submissions.
//!
//! ffmpeg pulls the audio track out as mono 16 kHz WAV — the shape
//! transcription models expect — into the request's staging directory.
//! Whether a track exists at all is known from the ffprobe result, so the
//! caller only invokes this when there is something to extract.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::submission::Stage;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Extract the audio track as a mono WAV buffer.
pub async fn extract_wav(
    config: &IngestConfig,
    video: &Path,
    stage: &Stage,
) -> Result<Vec<u8>, IngestError> {
    let wav_path = stage.path().join("audio.wav");
    let output = Command::new(&config.ffmpeg_bin)
        .args(["-v", "error", "-y", "-i"])
        .arg(video)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(config.audio_sample_rate.to_string())
        .args(["-f", "wav"])
        .arg(&wav_path)
        .output()
        .await
        .map_err(|e| IngestError::ConversionFailed {
            tool: config.ffmpeg_bin.clone(),
            detail: format!("failed to launch: {e}"),
        })?;

    if !output.status.success() {
        return Err(IngestError::ConversionFailed {
            tool: config.ffmpeg_bin.clone(),
            detail: format!(
                "audio extraction {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let bytes = std::fs::read(&wav_path)?;
    debug!("Extracted {} bytes of WAV audio", bytes.len());
    Ok(bytes)
}
