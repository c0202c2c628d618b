//! Configuration for the ingestion pipeline.
//!
//! All behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across request handlers, serialise it for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Configuration for one [`crate::ingest::IngestionPipeline`].
///
/// Built via [`IngestConfig::builder()`] or [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use skillscan::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .ssim_threshold(0.75)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// SSIM score below which a sampled frame counts as new information.
    /// Range: -1.0–1.0. Default: 0.8.
    ///
    /// The source material carries no documented derivation for 0.8, so it
    /// is a configurable default rather than a validated constant. Lower
    /// values keep fewer keyframes; 1.0 keeps every sampled frame.
    pub ssim_threshold: f64,

    /// Seconds of source video between candidate frames. Default: 2.0.
    ///
    /// The sampling stride is `max(1, round(fps * sample_interval_secs))`.
    /// This is a cost bound, not a correctness requirement: every candidate
    /// that survives the SSIM gate triggers one vision API call.
    pub sample_interval_secs: f64,

    /// Rendering DPI used when rasterising document pages. Range: 72–400.
    /// Default: 150.
    ///
    /// 150 DPI keeps slide text sharp enough for a vision model to read
    /// while the per-page PNG stays well under typical API upload limits.
    pub raster_dpi: u32,

    /// Number of concurrent vision API calls per request. Default: 4.
    ///
    /// Description calls are network-bound and independent of each other,
    /// so fanning out cuts wall-clock time. Result order is restored before
    /// the final join regardless of completion order.
    pub concurrency: usize,

    /// Maximum retry attempts on a transient vision API failure. Default: 2.
    ///
    /// A slot that still fails after all retries degrades in place: its
    /// text becomes an inline error string and the request continues.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s. Backoff avoids the
    /// thundering-herd problem when several slots retry at once.
    pub retry_backoff_ms: u64,

    /// Wall-clock budget for a whole request in seconds. Default: 600.
    ///
    /// If exceeded, in-flight external calls are abandoned and the request
    /// fails with [`IngestError::Timeout`] — no partial text is returned.
    pub request_timeout_secs: u64,

    /// Per-provider-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Sample rate of the extracted mono WAV handed to the transcriber.
    /// Default: 16000 (what whisper-family models expect).
    pub audio_sample_rate: u32,

    /// Hard cap on accepted keyframes per video (0 = unlimited). Default: 0.
    ///
    /// The SSIM gate already bounds keyframes in practice; this is a belt
    /// for pathological inputs where every sampled frame differs.
    pub max_keyframes: usize,

    /// Office-to-PDF converter binary. Default: "soffice".
    pub office_bin: String,

    /// PDF rasteriser binary (poppler). Default: "pdftoppm".
    pub pdftoppm_bin: String,

    /// Video/audio decoder binary. Default: "ffmpeg".
    pub ffmpeg_bin: String,

    /// Media prober binary. Default: "ffprobe".
    pub ffprobe_bin: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ssim_threshold: 0.8,
            sample_interval_secs: 2.0,
            raster_dpi: 150,
            concurrency: 4,
            max_retries: 2,
            retry_backoff_ms: 500,
            request_timeout_secs: 600,
            api_timeout_secs: 120,
            audio_sample_rate: 16_000,
            max_keyframes: 0,
            office_bin: "soffice".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn ssim_threshold(mut self, t: f64) -> Self {
        self.config.ssim_threshold = t;
        self
    }

    pub fn sample_interval_secs(mut self, secs: f64) -> Self {
        self.config.sample_interval_secs = secs;
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.config.raster_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn audio_sample_rate(mut self, hz: u32) -> Self {
        self.config.audio_sample_rate = hz;
        self
    }

    pub fn max_keyframes(mut self, n: usize) -> Self {
        self.config.max_keyframes = n;
        self
    }

    pub fn office_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.office_bin = bin.into();
        self
    }

    pub fn pdftoppm_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.pdftoppm_bin = bin.into();
        self
    }

    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffmpeg_bin = bin.into();
        self
    }

    pub fn ffprobe_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffprobe_bin = bin.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if !(-1.0..=1.0).contains(&c.ssim_threshold) {
            return Err(IngestError::InvalidConfig(format!(
                "ssim_threshold must be within -1.0–1.0, got {}",
                c.ssim_threshold
            )));
        }
        if !c.sample_interval_secs.is_finite() || c.sample_interval_secs <= 0.0 {
            return Err(IngestError::InvalidConfig(format!(
                "sample_interval_secs must be > 0, got {}",
                c.sample_interval_secs
            )));
        }
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_constants() {
        let c = IngestConfig::default();
        assert_eq!(c.ssim_threshold, 0.8);
        assert_eq!(c.sample_interval_secs, 2.0);
        assert_eq!(c.audio_sample_rate, 16_000);
    }

    #[test]
    fn builder_clamps_dpi_and_concurrency() {
        let c = IngestConfig::builder()
            .raster_dpi(10_000)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.raster_dpi, 400);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_bad_threshold() {
        let err = IngestConfig::builder().ssim_threshold(1.5).build();
        assert!(matches!(err, Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let err = IngestConfig::builder().sample_interval_secs(0.0).build();
        assert!(matches!(err, Err(IngestError::InvalidConfig(_))));
    }
}
