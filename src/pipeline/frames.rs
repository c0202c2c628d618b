//! Video frame sampling and SSIM-gated keyframe selection.
//!
//! ## How selection works
//!
//! ffmpeg decodes the video to a raw rgb24 stream on stdout; we count
//! frames and lift one *candidate* every `stride` frames, where
//! `stride = max(1, round(fps * sample_interval_secs))` — roughly one
//! candidate every two seconds of source at the default interval. Each
//! candidate is compared against the grayscale reduction of the **most
//! recently accepted** frame (not the previous candidate) using SSIM; a
//! score below the threshold means the picture changed enough to warrant
//! its own description. Single pass, no lookahead.
//!
//! The grayscale reduction exists only for comparison. Descriptions are
//! always generated from the full-colour frame.
//!
//! ## Why subprocess ffmpeg?
//!
//! The decoder runs out-of-process with a pipe, so a corrupt container can
//! never take the server down, and the pipeline needs no codec bindings.
//! ffprobe supplies fps/dimensions up front since a raw rgb24 stream
//! carries no headers.

use crate::config::IngestConfig;
use crate::error::IngestError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// A single decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Ordinal index in the decoded stream (0-based).
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Packed rgb24 pixel data, row-major.
    pub rgb: Vec<u8>,
    /// Grayscale reduction used only for SSIM comparison.
    pub gray: Vec<u8>,
}

impl Frame {
    /// Build a frame from packed rgb24 data, computing the grayscale
    /// reduction (integer BT.601 luma).
    pub fn from_rgb(index: u64, width: u32, height: u32, rgb: Vec<u8>) -> Self {
        let gray = rgb
            .chunks_exact(3)
            .map(|px| {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((77 * r + 150 * g + 29 * b) >> 8) as u8
            })
            .collect();
        Self {
            index,
            width,
            height,
            rgb,
            gray,
        }
    }
}

/// Candidate sampling stride in frames: `max(1, round(fps * interval))`.
///
/// A cost bound, not a correctness requirement — it caps how many frames
/// reach the SSIM gate (and thus how many vision calls a video can cost).
pub fn sample_stride(fps: f64, interval_secs: f64) -> u64 {
    let stride = (fps * interval_secs).round();
    if stride.is_finite() && stride >= 1.0 {
        stride as u64
    } else {
        1
    }
}

// Stabilising constants from the SSIM paper, for 8-bit dynamic range.
const SSIM_C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const SSIM_C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);
const SSIM_BLOCK: usize = 8;

/// Structural similarity between two equal-dimension grayscale images.
///
/// Mean of the standard SSIM statistic over 8×8 blocks (edge blocks may
/// be smaller). Returns a score in [-1, 1]; 1.0 for identical inputs,
/// and `ssim(a, b) == ssim(b, a)`.
pub fn ssim(a: &[u8], b: &[u8], width: usize, height: usize) -> f64 {
    debug_assert_eq!(a.len(), width * height);
    debug_assert_eq!(b.len(), width * height);
    if width == 0 || height == 0 {
        return 1.0;
    }

    let mut total = 0.0;
    let mut blocks = 0u32;

    for by in (0..height).step_by(SSIM_BLOCK) {
        for bx in (0..width).step_by(SSIM_BLOCK) {
            let bw = SSIM_BLOCK.min(width - bx);
            let bh = SSIM_BLOCK.min(height - by);
            let n = (bw * bh) as f64;

            let (mut sum_a, mut sum_b) = (0.0f64, 0.0f64);
            let (mut sq_a, mut sq_b, mut cross) = (0.0f64, 0.0f64, 0.0f64);

            for y in by..by + bh {
                let row = y * width;
                for x in bx..bx + bw {
                    let pa = a[row + x] as f64;
                    let pb = b[row + x] as f64;
                    sum_a += pa;
                    sum_b += pb;
                    sq_a += pa * pa;
                    sq_b += pb * pb;
                    cross += pa * pb;
                }
            }

            let mu_a = sum_a / n;
            let mu_b = sum_b / n;
            let var_a = sq_a / n - mu_a * mu_a;
            let var_b = sq_b / n - mu_b * mu_b;
            let cov = cross / n - mu_a * mu_b;

            let numerator = (2.0 * mu_a * mu_b + SSIM_C1) * (2.0 * cov + SSIM_C2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + SSIM_C1) * (var_a + var_b + SSIM_C2);
            total += numerator / denominator;
            blocks += 1;
        }
    }

    total / blocks as f64
}

/// Stateful single-pass keyframe gate.
///
/// The first offered frame is always accepted — it establishes the
/// similarity baseline. Each later frame is compared against the last
/// *accepted* frame's grayscale reduction and accepted only when the
/// score drops below the threshold.
pub struct KeyframeSelector {
    threshold: f64,
    metric: fn(&[u8], &[u8], usize, usize) -> f64,
    last_accepted: Option<Vec<u8>>,
}

impl KeyframeSelector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            metric: ssim,
            last_accepted: None,
        }
    }

    /// Substitute the similarity metric (tests use deterministic stubs).
    #[cfg(test)]
    pub fn with_metric(threshold: f64, metric: fn(&[u8], &[u8], usize, usize) -> f64) -> Self {
        Self {
            threshold,
            metric,
            last_accepted: None,
        }
    }

    /// Offer a candidate; returns true when it becomes a keyframe.
    pub fn offer(&mut self, frame: &Frame) -> bool {
        let accepted = match &self.last_accepted {
            None => true,
            // Dimension change mid-stream counts as new information.
            Some(last) if last.len() != frame.gray.len() => true,
            Some(last) => {
                let score = (self.metric)(
                    last,
                    &frame.gray,
                    frame.width as usize,
                    frame.height as usize,
                );
                debug!(index = frame.index, score, "candidate scored");
                score < self.threshold
            }
        };
        if accepted {
            self.last_accepted = Some(frame.gray.clone());
        }
        accepted
    }
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Probe the container for fps, dimensions, and audio presence.
pub async fn probe(config: &IngestConfig, path: &Path) -> Result<VideoInfo, IngestError> {
    let output = Command::new(&config.ffprobe_bin)
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .await
        .map_err(|e| IngestError::VideoDecode {
            detail: format!("failed to launch {}: {e}", config.ffprobe_bin),
        })?;

    if !output.status.success() {
        return Err(IngestError::VideoDecode {
            detail: format!(
                "{} {}: {}",
                config.ffprobe_bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(|e| IngestError::VideoDecode {
            detail: format!("unparseable ffprobe output: {e}"),
        })?;

    let streams = value["streams"].as_array().cloned().unwrap_or_default();
    let has_audio = streams
        .iter()
        .any(|s| s["codec_type"].as_str() == Some("audio"));

    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| IngestError::VideoDecode {
            detail: "no video stream in container".to_string(),
        })?;

    let width = video["width"].as_u64().unwrap_or(0) as u32;
    let height = video["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(IngestError::VideoDecode {
            detail: "video stream reports zero dimensions".to_string(),
        });
    }

    let fps = video["avg_frame_rate"]
        .as_str()
        .and_then(parse_rate)
        .or_else(|| video["r_frame_rate"].as_str().and_then(parse_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        fps,
        width,
        height,
        has_audio,
    })
}

/// Parse an ffprobe rational like "30000/1001" or "25/1".
fn parse_rate(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.parse::<f64>().ok()?, d.parse::<f64>().ok()?),
        None => (s.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || !num.is_finite() {
        return None;
    }
    let rate = num / den;
    (rate > 0.0).then_some(rate)
}

/// Keyframes accepted from one video plus the candidate count.
#[derive(Debug)]
pub struct SampledKeyframes {
    /// Accepted frames, strictly in temporal order.
    pub frames: Vec<Frame>,
    /// Candidates that reached the SSIM gate.
    pub candidates: usize,
}

/// Decode the video and run the keyframe gate over sampled candidates.
///
/// An empty or zero-frame video yields an empty set, not an error; a
/// container ffmpeg cannot decode at all fails with
/// [`IngestError::VideoDecode`].
pub async fn select_keyframes(
    config: &IngestConfig,
    path: &Path,
    info: &VideoInfo,
) -> Result<SampledKeyframes, IngestError> {
    let stride = sample_stride(info.fps, config.sample_interval_secs);
    let frame_size = info.width as usize * info.height as usize * 3;
    debug!(
        fps = info.fps,
        stride,
        frame_size,
        "starting keyframe selection"
    );

    let mut child = Command::new(&config.ffmpeg_bin)
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| IngestError::VideoDecode {
            detail: format!("failed to launch {}: {e}", config.ffmpeg_bin),
        })?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| IngestError::Internal("ffmpeg stdout not captured".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| IngestError::Internal("ffmpeg stderr not captured".to_string()))?;

    // Drain stderr concurrently so a chatty decoder cannot deadlock the pipe.
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let mut selector = KeyframeSelector::new(config.ssim_threshold);
    let mut frames: Vec<Frame> = Vec::new();
    let mut decoded: u64 = 0;
    let mut candidates: usize = 0;
    let mut capped = false;
    let mut buf = vec![0u8; frame_size];

    loop {
        match stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(IngestError::VideoDecode {
                    detail: format!("reading decoded frames: {e}"),
                })
            }
        }

        if decoded % stride == 0 {
            candidates += 1;
            let frame = Frame::from_rgb(decoded, info.width, info.height, buf.clone());
            if selector.offer(&frame) {
                frames.push(frame);
                if config.max_keyframes > 0 && frames.len() >= config.max_keyframes {
                    capped = true;
                    break;
                }
            }
        }
        decoded += 1;
    }

    if capped {
        // Cap reached; stop the decoder early.
        let _ = child.kill().await;
    }
    let status = child.wait().await.map_err(|e| IngestError::Internal(format!("ffmpeg wait: {e}")))?;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if decoded == 0 && !status.success() {
        return Err(IngestError::VideoDecode {
            detail: format!("{} {}: {}", config.ffmpeg_bin, status, stderr_text.trim()),
        });
    }
    if !status.success() && !capped {
        // Partial decode (truncated file): keep what we have.
        warn!(decoded, "ffmpeg exited non-zero after partial decode: {}", stderr_text.trim());
    }

    debug!(
        decoded,
        candidates,
        keyframes = frames.len(),
        "keyframe selection finished"
    );
    Ok(SampledKeyframes { frames, candidates })
}
