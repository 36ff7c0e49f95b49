//! Shared fixtures: synthetic PDFs, a file-writing rasterizer and scripted backends.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use doctriage::Provider;
use doctriage_analysis::render::{PageRasterizer, RenderError};
use doctriage_analysis::vision::{ProviderResponse, VisionBackend, VisionError, VisionRequest};

/// Write a PDF with one line of text per page.
pub fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", page))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Writes `"<file stem>:<page>"` as the page image.
pub struct StemRasterizer;

impl PageRasterizer for StemRasterizer {
    fn name(&self) -> &'static str {
        "stem"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    fn rasterize(
        &self,
        pdf_path: &Path,
        page: u32,
        _dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let stem = pdf_path.file_stem().unwrap().to_string_lossy();
        let path = output_dir.join(format!("page-{}.png", page));
        std::fs::write(&path, format!("{}:{}", stem, page))?;
        Ok(path)
    }
}

/// Answers with the file stem found in the first page image, after a delay,
/// while tracking how many calls overlap.
pub struct InstrumentedBackend {
    pub delay: Duration,
    pub current: AtomicUsize,
    pub max_seen: AtomicUsize,
    pub calls: AtomicUsize,
    pub image_counts: Mutex<Vec<usize>>,
}

impl InstrumentedBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            image_counts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VisionBackend for InstrumentedBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> &str {
        "instrumented"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<ProviderResponse, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        let images = request.images();
        self.image_counts.lock().unwrap().push(images.len());
        let first = images
            .first()
            .map(|i| String::from_utf8(STANDARD.decode(&i.data_base64).unwrap()).unwrap())
            .unwrap_or_default();
        let stem = first.split(':').next().unwrap_or_default().to_uppercase();

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ProviderResponse::Chat {
            text: format!("Looks like a {}.\nFinal Classification: {}", stem, stem),
            reported_usage: None,
        })
    }
}

/// Always rate limited.
pub struct ExhaustedBackend {
    pub calls: AtomicUsize,
}

#[async_trait]
impl VisionBackend for ExhaustedBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> &str {
        "exhausted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn complete(&self, _request: &VisionRequest<'_>) -> Result<ProviderResponse, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VisionError::from_status(
            Provider::Gemini,
            429,
            "RESOURCE_EXHAUSTED".to_string(),
        ))
    }
}
