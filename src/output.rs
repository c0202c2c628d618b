//! Output types: the joined solution text plus per-slot and per-request stats.

use crate::error::SlotError;
use serde::{Deserialize, Serialize};

/// Result of one description slot (a document page or a video keyframe).
///
/// Slots are joined strictly in `index` order. A slot whose vision call
/// failed still carries text — an inline error string — so a failure never
/// shifts later pages out of alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotResult {
    /// Zero-based position in the join order.
    pub index: usize,
    /// Human-readable slot label, e.g. "page 3" or "keyframe 2".
    pub label: String,
    /// Description text, or an inline error string on failure.
    pub text: String,
    /// Retries spent on this slot.
    pub retries: u32,
    /// Wall-clock duration of the describe call(s) in milliseconds.
    pub duration_ms: u64,
    /// Set when the call failed after all retries (text is then the
    /// inline error string).
    pub error: Option<SlotError>,
}

/// Per-request counters, reported alongside the extracted text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Description slots attempted (pages or keyframes).
    pub slots_total: usize,
    /// Slots that degraded in place after exhausting retries.
    pub slots_failed: usize,
    /// Candidate frames evaluated by the keyframe selector (video only).
    pub candidates: usize,
    /// Keyframes accepted by the SSIM gate (video only).
    pub keyframes: usize,
    /// True when the video had an audio track and transcription produced text.
    pub transcribed: bool,
    /// Format conversion duration (office/pdf rasterisation or frame
    /// selection) in milliseconds.
    pub convert_duration_ms: u64,
    /// Total time spent in vision describe calls in milliseconds.
    pub describe_duration_ms: u64,
    /// End-to-end request duration in milliseconds.
    pub total_duration_ms: u64,
}

/// Final result of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    /// Ordered newline-join of every text block produced by the chain.
    pub extracted_text: String,
    /// Per-slot results in join order.
    pub slots: Vec<SlotResult>,
    /// Request counters.
    pub stats: IngestStats,
}
