//! The ingestion orchestrator: one submission in, normalized text out.
//!
//! ## Chains
//!
//! Documents (ppt, pdf, docx, image) run the page chain: convert to page
//! images, describe each page concurrently, join the descriptions with
//! newlines in page order.
//!
//! Videos run two chains concurrently: keyframe selection + description
//! on one side, audio extraction + transcription on the other. The two
//! results are stitched into labelled blocks:
//!
//! ```text
//! Keyframe Descriptions:
//! <one description per line>
//! Audio Transcription:
//! <transcript>
//! ```
//!
//! Transcription is best-effort: any failure there degrades to an empty
//! transcript with a warning, because the visual track usually carries
//! the substance of a submission and losing the audio should not cost
//! the whole request.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::output::{IngestOutput, IngestStats, SlotResult};
use crate::pipeline::{audio, convert, describe, encode, frames};
use crate::prompts;
use crate::providers::{Transcriber, VisionDescriber};
use crate::submission::{FileKind, Stage, SubmissionFile};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The full ingestion pipeline, shared across requests.
///
/// Holds the configuration and the model collaborators; each
/// [`ingest`](Self::ingest) call is independent and the pipeline can be
/// called concurrently from many request handlers.
pub struct IngestionPipeline {
    config: IngestConfig,
    describer: Arc<dyn VisionDescriber>,
    transcriber: Arc<dyn Transcriber>,
}

impl IngestionPipeline {
    pub fn new(
        config: IngestConfig,
        describer: Arc<dyn VisionDescriber>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            config,
            describer,
            transcriber,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Process one submission to completion, under the request budget.
    ///
    /// On timeout every in-flight external call is abandoned and the
    /// request fails whole — no partial text.
    pub async fn ingest(&self, file: SubmissionFile) -> Result<IngestOutput, IngestError> {
        let budget = Duration::from_secs(self.config.request_timeout_secs);
        match tokio::time::timeout(budget, self.run(file)).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::Timeout {
                secs: self.config.request_timeout_secs,
            }),
        }
    }

    async fn run(&self, file: SubmissionFile) -> Result<IngestOutput, IngestError> {
        let started = Instant::now();
        info!(kind = %file.kind, name = %file.name, bytes = file.bytes.len(), "ingesting submission");

        // Intermediates for this request live and die with the stage.
        let stage = Stage::new()?;
        let (extracted_text, slots, mut stats) = match file.kind {
            FileKind::Video => self.video_chain(&file, &stage).await?,
            _ => self.document_chain(&file, &stage).await?,
        };

        stats.slots_total = slots.len();
        stats.slots_failed = slots.iter().filter(|s| s.error.is_some()).count();
        stats.total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            slots = stats.slots_total,
            failed = stats.slots_failed,
            total_ms = stats.total_duration_ms,
            "ingestion finished"
        );

        Ok(IngestOutput {
            extracted_text,
            slots,
            stats,
        })
    }

    /// ppt/pdf/docx/image: page images -> descriptions -> newline join.
    async fn document_chain(
        &self,
        file: &SubmissionFile,
        stage: &Stage,
    ) -> Result<(String, Vec<SlotResult>, IngestStats), IngestError> {
        let convert_started = Instant::now();
        let pages = convert::to_page_images(&self.config, file, stage).await?;
        let convert_duration_ms = convert_started.elapsed().as_millis() as u64;

        let prompt = match file.kind {
            FileKind::Ppt => prompts::SLIDE_PROMPT,
            FileKind::Pdf | FileKind::Docx => prompts::PAGE_PROMPT,
            FileKind::Image => prompts::IMAGE_PROMPT,
            FileKind::Video => unreachable!("video never enters the document chain"),
        };
        let label = match file.kind {
            FileKind::Ppt => "slide",
            FileKind::Image => "image",
            _ => "page",
        };

        let mut items = Vec::with_capacity(pages.len());
        for page in &pages {
            items.push((
                format!("{label} {}", page.number),
                encode::page_data_url(page)?,
            ));
        }

        let describe_started = Instant::now();
        let slots = self.describe_all(items, prompt).await;
        let describe_duration_ms = describe_started.elapsed().as_millis() as u64;

        let text = slots
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let stats = IngestStats {
            convert_duration_ms,
            describe_duration_ms,
            ..Default::default()
        };
        Ok((text, slots, stats))
    }

    /// video: keyframes + descriptions and audio + transcript, concurrently.
    async fn video_chain(
        &self,
        file: &SubmissionFile,
        stage: &Stage,
    ) -> Result<(String, Vec<SlotResult>, IngestStats), IngestError> {
        let path = stage.materialize(file)?;
        let info = frames::probe(&self.config, &path).await?;
        info!(
            fps = info.fps,
            width = info.width,
            height = info.height,
            has_audio = info.has_audio,
            "probed video"
        );

        let visual = async {
            let convert_started = Instant::now();
            let sampled = frames::select_keyframes(&self.config, &path, &info).await?;
            let convert_duration_ms = convert_started.elapsed().as_millis() as u64;

            let mut items = Vec::with_capacity(sampled.frames.len());
            for (i, frame) in sampled.frames.iter().enumerate() {
                items.push((format!("keyframe {}", i + 1), encode::frame_data_url(frame)?));
            }

            let describe_started = Instant::now();
            let slots = self.describe_all(items, prompts::FRAME_PROMPT).await;
            let describe_duration_ms = describe_started.elapsed().as_millis() as u64;
            Ok::<_, IngestError>((sampled, slots, convert_duration_ms, describe_duration_ms))
        };

        let aural = async {
            if !info.has_audio {
                return (String::new(), false);
            }
            let wav = match audio::extract_wav(&self.config, &path, stage).await {
                Ok(wav) => wav,
                Err(e) => {
                    warn!("audio extraction failed, continuing without transcript: {e}");
                    return (String::new(), false);
                }
            };
            match self.transcriber.transcribe(wav).await {
                Ok(segments) => {
                    let transcript = segments
                        .iter()
                        .map(|s| s.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    (transcript, true)
                }
                Err(e) => {
                    warn!("transcription failed, continuing without transcript: {e}");
                    (String::new(), false)
                }
            }
        };

        let (visual, (transcript, transcribed)) = tokio::join!(visual, aural);
        let (sampled, slots, convert_duration_ms, describe_duration_ms) = visual?;

        let descriptions = slots
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!(
            "Keyframe Descriptions:\n{descriptions}\nAudio Transcription:\n{transcript}"
        );

        let stats = IngestStats {
            candidates: sampled.candidates,
            keyframes: sampled.frames.len(),
            transcribed,
            convert_duration_ms,
            describe_duration_ms,
            ..Default::default()
        };
        Ok((text, slots, stats))
    }

    /// Describe every item with bounded concurrency, preserving order.
    async fn describe_all(
        &self,
        items: Vec<(String, String)>,
        prompt: &str,
    ) -> Vec<SlotResult> {
        let futures = items
            .into_iter()
            .enumerate()
            .map(|(index, (label, data_url))| {
                let describer = Arc::clone(&self.describer);
                let config = self.config.clone();
                async move {
                    describe::describe_slot(&describer, &config, index, label, prompt, data_url)
                        .await
                }
            });

        // `buffered` (not `buffer_unordered`) keeps results in input order
        // no matter which call finishes first.
        stream::iter(futures)
            .buffered(self.config.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, TranscriptSegment};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers "Page 1", "Page 2", ... in call order.
    struct SequenceDescriber(AtomicUsize);

    impl SequenceDescriber {
        fn new() -> Self {
            Self(AtomicUsize::new(0))
        }
    }

    #[async_trait]
    impl VisionDescriber for SequenceDescriber {
        async fn describe(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Page {}", n + 1))
        }
    }

    struct NoopTranscriber;

    #[async_trait]
    impl Transcriber for NoopTranscriber {
        async fn transcribe(&self, _: Vec<u8>) -> Result<Vec<TranscriptSegment>, ProviderError> {
            Ok(vec![])
        }
    }

    /// Never completes; used to trip the request budget.
    struct StallingDescriber;

    #[async_trait]
    impl VisionDescriber for StallingDescriber {
        async fn describe(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            futures::future::pending().await
        }
    }

    fn pipeline_with(describer: Arc<dyn VisionDescriber>) -> IngestionPipeline {
        IngestionPipeline::new(IngestConfig::default(), describer, Arc::new(NoopTranscriber))
    }

    fn tiny_png() -> Vec<u8> {
        let img = RgbImage::from_fn(4, 4, |x, y| image::Rgb([x as u8 * 60, y as u8 * 60, 90]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn descriptions_join_in_slot_order() {
        let pipeline = pipeline_with(Arc::new(SequenceDescriber::new()));
        let items = (1..=3)
            .map(|i| (format!("page {i}"), format!("data:image/png;base64,p{i}")))
            .collect();
        let slots = pipeline.describe_all(items, "prompt").await;
        let joined = slots.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n");
        assert_eq!(joined, "Page 1\nPage 2\nPage 3");
        assert_eq!(slots[2].label, "page 3");
    }

    #[tokio::test]
    async fn image_submission_end_to_end() {
        let pipeline = pipeline_with(Arc::new(SequenceDescriber::new()));
        let file = SubmissionFile::new("photo.png", FileKind::Image, tiny_png());
        let out = pipeline.ingest(file).await.unwrap();
        assert_eq!(out.extracted_text, "Page 1");
        assert_eq!(out.stats.slots_total, 1);
        assert_eq!(out.stats.slots_failed, 0);
        assert_eq!(out.slots[0].label, "image 1");
    }

    #[tokio::test]
    async fn identical_input_yields_identical_output() {
        let first = pipeline_with(Arc::new(SequenceDescriber::new()))
            .ingest(SubmissionFile::new("a.png", FileKind::Image, tiny_png()))
            .await
            .unwrap();
        let second = pipeline_with(Arc::new(SequenceDescriber::new()))
            .ingest(SubmissionFile::new("a.png", FileKind::Image, tiny_png()))
            .await
            .unwrap();
        assert_eq!(first.extracted_text, second.extracted_text);
    }

    #[tokio::test(start_paused = true)]
    async fn request_budget_aborts_stalled_requests() {
        let config = IngestConfig::builder()
            .request_timeout_secs(5)
            .build()
            .unwrap();
        let pipeline = IngestionPipeline::new(
            config,
            Arc::new(StallingDescriber),
            Arc::new(NoopTranscriber),
        );
        let file = SubmissionFile::new("photo.png", FileKind::Image, tiny_png());
        match pipeline.ingest(file).await {
            Err(IngestError::Timeout { secs }) => assert_eq!(secs, 5),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
