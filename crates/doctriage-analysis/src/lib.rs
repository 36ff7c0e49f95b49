//! Document rendering, provider clients and the classification pipeline.

pub mod extract;
pub mod pipeline;
pub mod render;
pub mod vision;

pub use extract::extract_classification;
pub use pipeline::{ClassificationRun, DocumentError, Pipeline, PipelineError, RunOutcome};
pub use render::{PageRasterizer, PdftoppmRasterizer, RenderError};
pub use vision::{VisionBackend, VisionClient, VisionError};
