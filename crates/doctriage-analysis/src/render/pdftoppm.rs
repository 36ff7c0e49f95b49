//! Poppler `pdftoppm` rasterizer.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{PageRasterizer, RenderError};

const PDFTOPPM_NOT_FOUND: &str = "pdftoppm not found. Install poppler-utils \
     (apt install poppler-utils, brew install poppler)";

/// Shells out to `pdftoppm` for each page.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer;

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn is_available(&self) -> bool {
        which::which("pdftoppm").is_ok()
    }

    fn availability_hint(&self) -> String {
        match which::which("pdftoppm") {
            Ok(path) => format!("pdftoppm found at {}", path.display()),
            Err(_) => PDFTOPPM_NOT_FOUND.to_string(),
        }
    }

    fn rasterize(
        &self,
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let page_str = page.to_string();
        let dpi_str = dpi.to_string();
        let output_prefix = output_dir.join("page");

        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(&output_prefix)
            .output();

        match output {
            Ok(o) if o.status.success() => {
                find_page_image(output_dir, page).ok_or_else(|| RenderError::PageFailed {
                    page,
                    reason: "no image generated".to_string(),
                })
            }
            Ok(o) => Err(RenderError::PageFailed {
                page,
                reason: String::from_utf8_lossy(&o.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                RenderError::RasterizerUnavailable(PDFTOPPM_NOT_FOUND.to_string()),
            ),
            Err(e) => Err(RenderError::Io(e)),
        }
    }
}

/// Find the image file for a specific page number.
///
/// pdftoppm names files like page-1.png, page-01.png or page-001.png; the
/// padding width depends on the document's page count.
pub fn find_page_image(output_dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let filename = format!("page-{:0width$}.png", page, width = digits);
        let path = output_dir.join(&filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}
