//! PDF page rendering.
//!
//! Opens a document with lopdf to learn its page count and encryption state,
//! then rasterizes the first pages to PNG through a [`PageRasterizer`] and
//! returns them base64 encoded in page order.

mod pdftoppm;
mod text;

pub use pdftoppm::{find_page_image, PdftoppmRasterizer};
pub use text::extract_text;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use doctriage::models::PageImage;

/// Render resolution: 2x the 72 DPI PDF user space.
pub const RENDER_DPI: u32 = 144;

/// Errors from opening or rendering a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    #[error("not a PDF: {0}")]
    NotPdf(PathBuf),

    #[error("document unreadable: {path}: {reason}")]
    DocumentUnreadable { path: PathBuf, reason: String },

    #[error("document is encrypted: {0}")]
    Encrypted(PathBuf),

    #[error("rasterizer not available: {0}")]
    RasterizerUnavailable(String),

    #[error("failed to render page {page}: {reason}")]
    PageFailed { page: u32, reason: String },

    #[error("render task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns one PDF page into a PNG file.
pub trait PageRasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Human-readable setup hint shown by `check`.
    fn availability_hint(&self) -> String;

    /// Render 1-based `page` at `dpi` into `output_dir`, returning the PNG path.
    fn rasterize(
        &self,
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError>;
}

/// Open a PDF, rejecting missing, non-PDF, unreadable and encrypted files.
pub fn open_document(path: &Path) -> Result<Document, RenderError> {
    if !path.is_file() {
        return Err(RenderError::NotFound(path.to_path_buf()));
    }

    let mut magic = [0u8; 5];
    let mut file = std::fs::File::open(path)?;
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF-" {
        return Err(RenderError::NotPdf(path.to_path_buf()));
    }

    let doc = Document::load(path).map_err(|e| RenderError::DocumentUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(RenderError::Encrypted(path.to_path_buf()));
    }
    Ok(doc)
}

/// Number of pages in a PDF.
pub fn page_count(path: &Path) -> Result<u32, RenderError> {
    let doc = open_document(path)?;
    Ok(doc.get_pages().len() as u32)
}

/// Render the first `max_pages` pages of a PDF as base64 PNGs in page order.
///
/// Pages that fail to rasterize are logged and skipped, so the result may be
/// shorter than requested or empty. Temporary files are removed on return.
pub fn render_pages(
    path: &Path,
    max_pages: usize,
    rasterizer: &dyn PageRasterizer,
) -> Result<Vec<PageImage>, RenderError> {
    let total = match page_count(path) {
        Ok(n) => n,
        Err(e) => {
            warn!("Cannot render {}: {}", path.display(), e);
            return Err(e);
        }
    };
    let to_render = total.min(max_pages as u32);
    debug!(
        "Rendering {} of {} pages from {} with {}",
        to_render,
        total,
        path.display(),
        rasterizer.name()
    );

    let temp_dir = TempDir::new()?;
    let mut images = Vec::with_capacity(to_render as usize);

    for page in 1..=to_render {
        let png = match rasterizer.rasterize(path, page, RENDER_DPI, temp_dir.path()) {
            Ok(png) => png,
            Err(RenderError::RasterizerUnavailable(hint)) => {
                return Err(RenderError::RasterizerUnavailable(hint));
            }
            Err(e) => {
                warn!("Skipping page {} of {}: {}", page, path.display(), e);
                continue;
            }
        };
        match std::fs::read(&png) {
            Ok(bytes) => images.push(PageImage::png(page, STANDARD.encode(bytes))),
            Err(e) => warn!("Skipping page {} of {}: {}", page, path.display(), e),
        }
    }

    Ok(images)
}

/// Run [`render_pages`] on the blocking thread pool.
pub async fn render_pages_blocking(
    path: PathBuf,
    max_pages: usize,
    rasterizer: Arc<dyn PageRasterizer>,
) -> Result<Vec<PageImage>, RenderError> {
    tokio::task::spawn_blocking(move || render_pages(&path, max_pages, rasterizer.as_ref()))
        .await
        .map_err(|e| RenderError::Join(e.to_string()))?
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Writes a placeholder PNG naming the page; fails on listed pages.
    struct FakeRasterizer {
        fail_pages: Vec<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl FakeRasterizer {
        fn new(fail_pages: Vec<u32>) -> Self {
            Self {
                fail_pages,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageRasterizer for FakeRasterizer {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn rasterize(
            &self,
            _pdf_path: &Path,
            page: u32,
            dpi: u32,
            output_dir: &Path,
        ) -> Result<PathBuf, RenderError> {
            assert_eq!(dpi, RENDER_DPI);
            self.calls.lock().unwrap().push(page);
            if self.fail_pages.contains(&page) {
                return Err(RenderError::PageFailed {
                    page,
                    reason: "boom".to_string(),
                });
            }
            let path = output_dir.join(format!("page-{:02}.png", page));
            std::fs::write(&path, format!("png-{}", page))?;
            Ok(path)
        }
    }

    fn decode(image: &PageImage) -> String {
        String::from_utf8(STANDARD.decode(&image.data_base64).unwrap()).unwrap()
    }

    #[test]
    fn test_renders_first_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("five.pdf");
        test_pdf::write(&pdf, &["one", "two", "three", "four", "five"]);

        let rasterizer = FakeRasterizer::new(vec![]);
        let images = render_pages(&pdf, 2, &rasterizer).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].page_number, 1);
        assert_eq!(images[1].page_number, 2);
        assert_eq!(decode(&images[0]), "png-1");
        assert_eq!(decode(&images[1]), "png-2");
        assert_eq!(images[0].mime_type, "image/png");
    }

    #[test]
    fn test_short_document_renders_all_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("one.pdf");
        test_pdf::write(&pdf, &["only"]);

        let images = render_pages(&pdf, 4, &FakeRasterizer::new(vec![])).unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_failed_page_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("three.pdf");
        test_pdf::write(&pdf, &["a", "b", "c"]);

        let rasterizer = FakeRasterizer::new(vec![2]);
        let images = render_pages(&pdf, 3, &rasterizer).unwrap();
        let pages: Vec<u32> = images.iter().map(|i| i.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(*rasterizer.calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_and_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer = FakeRasterizer::new(vec![]);

        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            render_pages(&missing, 2, &rasterizer),
            Err(RenderError::NotFound(_))
        ));

        let text = dir.path().join("notes.pdf");
        std::fs::write(&text, "just some text").unwrap();
        assert!(matches!(
            render_pages(&text, 2, &rasterizer),
            Err(RenderError::NotPdf(_))
        ));
    }

    #[test]
    fn test_corrupt_pdf_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("corrupt.pdf");
        std::fs::write(&pdf, "%PDF-1.5\nthis is not a real document").unwrap();

        let result = render_pages(&pdf, 2, &FakeRasterizer::new(vec![]));
        assert!(matches!(result, Err(RenderError::DocumentUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_render_off_the_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("two.pdf");
        test_pdf::write(&pdf, &["a", "b"]);

        let rasterizer: Arc<dyn PageRasterizer> = Arc::new(FakeRasterizer::new(vec![]));
        let images = render_pages_blocking(pdf, 2, rasterizer).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(page_count(&dir.path().join("two.pdf")).unwrap(), 2);
    }
}
