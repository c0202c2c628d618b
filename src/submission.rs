//! Submission artifacts and the request-scoped staging area.
//!
//! ## Why a staging area?
//!
//! The external tools (soffice, pdftoppm, ffmpeg) all want file-system
//! paths — they cannot stream from a byte buffer. A per-request
//! [`tempfile::TempDir`] gives every upload its own unique directory, so
//! concurrent requests never collide on file names and every intermediate
//! (converted PDF, page PNGs, extracted WAV) vanishes automatically when
//! [`Stage`] is dropped, on success, error, and panic-unwind alike.

use crate::error::IngestError;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Declared kind of an uploaded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Slide deck (ppt/pptx).
    Ppt,
    /// PDF document.
    Pdf,
    /// Word document (doc/docx).
    Docx,
    /// Still image.
    Image,
    /// Video with optional audio track.
    Video,
}

impl FileKind {
    /// Parse the declared kind string from the upload form.
    ///
    /// Fails with [`IngestError::UnsupportedFormat`] carrying the offending
    /// string, before anything touches the filesystem.
    pub fn parse(s: &str) -> Result<Self, IngestError> {
        match s {
            "ppt" => Ok(FileKind::Ppt),
            "pdf" => Ok(FileKind::Pdf),
            "docx" => Ok(FileKind::Docx),
            "image" => Ok(FileKind::Image),
            "video" => Ok(FileKind::Video),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Ppt => "ppt",
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Image => "image",
            FileKind::Video => "video",
        }
    }

    /// Fallback file extension when the original name carries none.
    /// soffice dispatches its import filter on the extension.
    fn default_extension(&self) -> &'static str {
        match self {
            FileKind::Ppt => "pptx",
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Image => "png",
            FileKind::Video => "mp4",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded artifact: raw bytes plus the declared kind and name.
///
/// Ephemeral — exists only for the duration of one request and is owned
/// exclusively by the pipeline invocation processing it.
#[derive(Debug, Clone)]
pub struct SubmissionFile {
    /// Original file name as uploaded (untrusted; sanitised before use).
    pub name: String,
    /// Declared kind from the upload form.
    pub kind: FileKind,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SubmissionFile {
    pub fn new(name: impl Into<String>, kind: FileKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }
}

/// Request-scoped staging directory for transient files.
///
/// Dropping the stage removes the directory and everything inside it.
pub struct Stage {
    dir: TempDir,
}

impl Stage {
    /// Create a fresh staging directory for one request.
    pub fn new() -> Result<Self, IngestError> {
        let dir = TempDir::with_prefix("skillscan-")?;
        debug!("Created staging dir: {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the staging directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the submission bytes into the stage under a sanitised name
    /// and return the resulting path.
    pub fn materialize(&self, file: &SubmissionFile) -> Result<PathBuf, IngestError> {
        let name = sanitize_name(&file.name, file.kind);
        let path = self.dir.path().join(name);
        std::fs::write(&path, &file.bytes)?;
        debug!("Staged {} ({} bytes)", path.display(), file.bytes.len());
        Ok(path)
    }
}

/// Reduce an untrusted upload name to a safe flat file name.
///
/// Strips any directory components, replaces everything outside
/// `[A-Za-z0-9._-]`, and guarantees a non-empty stem plus an extension the
/// downstream tools can dispatch on.
fn sanitize_name(name: &str, kind: FileKind) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let base = base.trim_matches('.').to_string();
    let base = if base.is_empty() || !base.contains(|c: char| c.is_ascii_alphanumeric()) {
        "upload".to_string()
    } else {
        base
    };

    if Path::new(&base).extension().is_some() {
        base
    } else {
        format!("{}.{}", base, kind.default_extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_known_kinds() {
        for (s, k) in [
            ("ppt", FileKind::Ppt),
            ("pdf", FileKind::Pdf),
            ("docx", FileKind::Docx),
            ("image", FileKind::Image),
            ("video", FileKind::Video),
        ] {
            assert_eq!(FileKind::parse(s).unwrap(), k);
        }
    }

    #[test]
    fn parse_unknown_kind_carries_the_string() {
        match FileKind::parse("xyz") {
            Err(IngestError::UnsupportedFormat(k)) => assert_eq!(k, "xyz"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn sanitize_strips_traversal() {
        let n = sanitize_name("../../etc/passwd", FileKind::Pdf);
        assert_eq!(n, "passwd.pdf");
    }

    #[test]
    fn sanitize_keeps_reasonable_names() {
        assert_eq!(
            sanitize_name("My Deck v2.pptx", FileKind::Ppt),
            "My_Deck_v2.pptx"
        );
    }

    #[test]
    fn sanitize_defaults_extension_by_kind() {
        assert_eq!(sanitize_name("clip", FileKind::Video), "clip.mp4");
        assert_eq!(sanitize_name("", FileKind::Image), "upload.png");
    }

    #[test]
    fn stage_removes_files_on_drop() {
        let file = SubmissionFile::new("a.pdf", FileKind::Pdf, b"%PDF-1.4".to_vec());
        let path;
        {
            let stage = Stage::new().unwrap();
            path = stage.materialize(&file).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists(), "staged file must not outlive the request");
    }
}
