//! # skillscan
//!
//! Turn heterogeneous submissions — slide decks, PDFs, Word documents,
//! images, and videos — into one normalized text description ("solution"
//! text) suitable for downstream skill extraction.
//!
//! ```text
//!                 ┌─ ppt/docx ─ soffice ─┐
//!  upload ─ stage ┤                      ├─ pdftoppm ─ pages ─┐
//!                 └─ pdf ────────────────┘                    ├─ describe ─ join
//!                    image ───────────────────────────────────┘
//!
//!                 ┌─ ffmpeg ─ SSIM gate ─ keyframes ─ describe ─┐
//!          video ─┤                                             ├─ blocks
//!                 └─ ffmpeg ─ wav ─ transcribe ─────────────────┘
//! ```
//!
//! Every visual unit (page, slide, image, keyframe) becomes one vision
//! describe call; descriptions are joined strictly in source order.
//! Videos additionally get their audio track transcribed, concurrently
//! with the visual chain. The joined text can then be scored into a flat
//! skill list and a hierarchical skill tree ([`skills`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use skillscan::{
//!     FileKind, IngestConfig, IngestionPipeline, OpenAiCompatClient, SubmissionFile,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(OpenAiCompatClient::new(
//!     "https://openrouter.ai/api/v1",
//!     std::env::var("API_KEY")?,
//!     120,
//! )?);
//! let pipeline = IngestionPipeline::new(
//!     IngestConfig::default(),
//!     client.clone(),
//!     client,
//! );
//!
//! let bytes = std::fs::read("deck.pptx")?;
//! let output = pipeline
//!     .ingest(SubmissionFile::new("deck.pptx", FileKind::Ppt, bytes))
//!     .await?;
//! println!("{}", output.extracted_text);
//! # Ok(())
//! # }
//! ```
//!
//! ## External tools
//!
//! Document and video handling shells out to `soffice`, `pdftoppm`,
//! `ffmpeg`, and `ffprobe`; their paths are configurable through
//! [`IngestConfig`]. Model calls go to any OpenAI-compatible endpoint
//! via [`OpenAiCompatClient`], or to anything implementing the
//! [`providers`] traits.

pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod skills;
pub mod submission;

pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{IngestError, SlotError};
pub use ingest::IngestionPipeline;
pub use output::{IngestOutput, IngestStats, SlotResult};
pub use providers::{
    OpenAiCompatClient, ProviderError, TextCompleter, Transcriber, TranscriptSegment,
    VisionDescriber,
};
pub use skills::{Skill, SkillEvaluation, SkillNode};
pub use submission::{FileKind, SubmissionFile};
