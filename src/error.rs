//! Error types for the skillscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the request cannot produce any output
//!   (unknown file kind, conversion tool crashed, unreadable video,
//!   request timeout). Returned as `Err(IngestError)` from
//!   [`crate::ingest::IngestionPipeline::ingest`]; no partial text is
//!   surfaced alongside it.
//!
//! * [`SlotError`] — **Non-fatal**: one description slot (a page or a
//!   keyframe) failed after retries. The slot's text becomes an inline
//!   error string and the pipeline continues, so the ordered join never
//!   loses page alignment. Stored inside [`crate::output::SlotResult`].
//!
//! Transcription failures are a third, even softer case: they degrade to
//! an empty transcript and are only logged, never stored.

use thiserror::Error;

/// All fatal errors returned by the skillscan library.
///
/// Slot-level failures use [`SlotError`] and are stored in
/// [`crate::output::SlotResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The declared file kind is not one we handle.
    #[error("Unsupported file type: '{0}'\nExpected one of: ppt, pdf, docx, image, video.")]
    UnsupportedFormat(String),

    /// An external conversion tool (soffice, pdftoppm) failed or is missing.
    #[error("{tool} failed: {detail}")]
    ConversionFailed { tool: String, detail: String },

    /// The video container could not be opened or decoded at all.
    #[error("Could not decode video: {detail}")]
    VideoDecode { detail: String },

    /// The request exceeded its wall-clock budget; in-flight calls abandoned.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// An external model returned a response we could not make sense of
    /// at a boundary that must succeed (e.g. skill scoring).
    #[error("Unexpected response from upstream model: {detail}")]
    Upstream { detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Staging-area I/O failed (temp dir creation, file write, page read).
    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single description slot.
///
/// The containing [`crate::output::SlotResult`] carries an inline error
/// string as its text, so downstream joining stays order-preserving.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlotError {
    /// Vision call failed after all retries.
    #[error("{label}: description failed after {retries} retries: {detail}")]
    DescribeFailed {
        label: String,
        retries: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_the_kind() {
        let e = IngestError::UnsupportedFormat("xyz".into());
        let msg = e.to_string();
        assert!(msg.contains("'xyz'"), "got: {msg}");
    }

    #[test]
    fn conversion_failed_names_the_tool() {
        let e = IngestError::ConversionFailed {
            tool: "soffice".into(),
            detail: "exit status 1".into(),
        };
        assert!(e.to_string().contains("soffice"));
    }

    #[test]
    fn timeout_display() {
        let e = IngestError::Timeout { secs: 600 };
        assert!(e.to_string().contains("600s"));
    }

    #[test]
    fn slot_error_display() {
        let e = SlotError::DescribeFailed {
            label: "keyframe 3".into(),
            retries: 2,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("keyframe 3"));
        assert!(msg.contains("HTTP 503"));
    }
}
