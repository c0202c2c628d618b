//! Document-to-image conversion via external tools.
//!
//! Office formats (ppt/pptx, doc/docx) go through soffice to PDF first;
//! PDFs are rasterised to one PNG per page with pdftoppm. Still images
//! skip conversion entirely. All intermediates land in the request's
//! [`Stage`] and disappear with it.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::submission::{FileKind, Stage, SubmissionFile};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// One rasterised page, ready for encoding.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page (or slide) number.
    pub number: usize,
    /// Encoded image bytes (PNG for rasterised pages, as-uploaded for
    /// still images).
    pub bytes: Vec<u8>,
}

/// Turn a document submission into ordered page images.
///
/// Still images pass through untouched, without ever touching the
/// filesystem. Video is handled by the frame chain, never here.
pub async fn to_page_images(
    config: &IngestConfig,
    file: &SubmissionFile,
    stage: &Stage,
) -> Result<Vec<PageImage>, IngestError> {
    match file.kind {
        FileKind::Image => Ok(vec![PageImage {
            number: 1,
            bytes: file.bytes.clone(),
        }]),
        FileKind::Pdf => {
            let path = stage.materialize(file)?;
            rasterize_pdf(config, &path, stage).await
        }
        FileKind::Ppt | FileKind::Docx => {
            let path = stage.materialize(file)?;
            let pdf = office_to_pdf(config, &path, stage).await?;
            rasterize_pdf(config, &pdf, stage).await
        }
        FileKind::Video => Err(IngestError::Internal(
            "video submissions are handled by the frame chain".to_string(),
        )),
    }
}

/// Convert an office document to PDF with headless LibreOffice.
async fn office_to_pdf(
    config: &IngestConfig,
    input: &Path,
    stage: &Stage,
) -> Result<PathBuf, IngestError> {
    let mut cmd = Command::new(&config.office_bin);
    cmd.args(["--headless", "--convert-to", "pdf", "--outdir"])
        .arg(stage.path())
        .arg(input);
    run_tool(&config.office_bin, cmd).await?;

    // soffice names the output after the input stem.
    let pdf = input.with_extension("pdf");
    if !pdf.exists() {
        return Err(IngestError::ConversionFailed {
            tool: config.office_bin.clone(),
            detail: format!("expected output {} was not produced", pdf.display()),
        });
    }
    info!("Converted {} to PDF", input.display());
    Ok(pdf)
}

/// Rasterise every page of a PDF to PNG and return them in page order.
async fn rasterize_pdf(
    config: &IngestConfig,
    pdf: &Path,
    stage: &Stage,
) -> Result<Vec<PageImage>, IngestError> {
    // Pages get their own subdirectory so the directory scan below never
    // picks up the staged upload itself.
    let pages_dir = stage.path().join("pages");
    std::fs::create_dir_all(&pages_dir)?;

    let mut cmd = Command::new(&config.pdftoppm_bin);
    cmd.arg("-r")
        .arg(config.raster_dpi.to_string())
        .arg("-png")
        .arg(pdf)
        .arg(pages_dir.join("page"));
    run_tool(&config.pdftoppm_bin, cmd).await?;

    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&pages_dir)? {
        let path = entry?.path();
        if let Some(number) = page_number(&path) {
            numbered.push((number, path));
        }
    }
    if numbered.is_empty() {
        return Err(IngestError::ConversionFailed {
            tool: config.pdftoppm_bin.clone(),
            detail: format!("no pages rasterised from {}", pdf.display()),
        });
    }

    // Lexicographic order is wrong past page 9 ("page-10" < "page-2"), so
    // sort on the parsed number.
    numbered.sort_by_key(|(n, _)| *n);

    let mut pages = Vec::with_capacity(numbered.len());
    for (number, path) in numbered {
        pages.push(PageImage {
            number,
            bytes: std::fs::read(&path)?,
        });
    }
    debug!("Rasterised {} pages from {}", pages.len(), pdf.display());
    Ok(pages)
}

/// Extract N from a pdftoppm output name like `page-07.png`.
fn page_number(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("page-")?.strip_suffix(".png")?;
    digits.parse().ok()
}

/// Run an external tool to completion, mapping launch failures and
/// non-zero exits to [`IngestError::ConversionFailed`].
async fn run_tool(tool: &str, mut cmd: Command) -> Result<(), IngestError> {
    let output = cmd.output().await.map_err(|e| IngestError::ConversionFailed {
        tool: tool.to_string(),
        detail: format!("failed to launch: {e}"),
    })?;
    if !output.status.success() {
        return Err(IngestError::ConversionFailed {
            tool: tool.to_string(),
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;

    #[test]
    fn page_numbers_parse_with_and_without_padding() {
        assert_eq!(page_number(Path::new("/t/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/t/page-07.png")), Some(7));
        assert_eq!(page_number(Path::new("/t/page-12.png")), Some(12));
        assert_eq!(page_number(Path::new("/t/deck.pdf")), None);
        assert_eq!(page_number(Path::new("/t/page-x.png")), None);
    }

    #[tokio::test]
    async fn image_kind_passes_through_without_staging_files() {
        let config = IngestConfig::default();
        let stage = Stage::new().unwrap();
        let file = SubmissionFile::new("photo.png", FileKind::Image, vec![1, 2, 3]);
        let pages = to_page_images(&config, &file, &stage).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].bytes, vec![1, 2, 3]);
        // No intermediates written for the passthrough path.
        assert_eq!(std::fs::read_dir(stage.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_tool_maps_to_conversion_failed() {
        let cmd = Command::new("definitely-not-a-real-binary-acbd18db");
        let err = run_tool("definitely-not-a-real-binary-acbd18db", cmd)
            .await
            .unwrap_err();
        match err {
            IngestError::ConversionFailed { tool, .. } => {
                assert_eq!(tool, "definitely-not-a-real-binary-acbd18db")
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
    }
}
