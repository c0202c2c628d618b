//! Pipeline stages, in the order a request flows through them:
//!
//! ```text
//! documents:  convert (soffice/pdftoppm) -> encode -> describe
//! videos:     frames (ffmpeg + SSIM gate) -> encode -> describe
//!             audio  (ffmpeg extract)     -> transcribe        (concurrent)
//! ```
//!
//! Each stage is an independent module with a narrow interface so stages
//! can be tested in isolation; [`crate::ingest`] wires them together.

pub mod audio;
pub mod convert;
pub mod describe;
pub mod encode;
pub mod frames;
