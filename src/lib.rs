//! # pagepress – print-accurate pagination and PDF rendering for resumes
//!
//! This crate turns a Markdown + CSS resume into paginated previews and a
//! multi-page PDF. There are two paths through it:
//!
//! **Preview**
//! 1. **Scope** – namespace user CSS and derive custom properties ([`scope`])
//! 2. **Measure** – parse, style and lay out blocks with Taffy ([`measure`])
//! 3. **Paginate** – pack measured blocks into pages ([`pagination`])
//!
//! **PDF** ([`pipeline`])
//! 1. **Stage A** – Markdown → print document on the worker ([`worker`], [`markdown`])
//! 2. **Stage B** – print document → tall raster ([`raster`])
//! 3. **Stage C** – raster → sliced PDF pages on the worker ([`assemble`])
//!
//! [`orchestrator`] decides when the PDF path runs, with an optional
//! [`cache`] short-circuit and cooperative [`cancel`]lation.

pub mod assemble;
pub mod cache;
pub mod cancel;
pub mod css;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod markdown;
pub mod measure;
pub mod orchestrator;
pub mod pagination;
pub mod pipeline;
pub mod raster;
pub mod scope;
pub mod style;
pub mod style_config;
pub mod templates;
pub mod worker;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use error::{MeasureError, PipelineError};
pub use orchestrator::{GenerationOrchestrator, OrchestratorConfig, OrchestratorEvent};
pub use pagination::{PageRecord, Pager};
pub use pipeline::{PdfArtifact, PdfPipeline, PdfRequest, PipelineConfig};
pub use scope::{ScopedStyleContext, StyleRegistry};
pub use style_config::{PaperSize, StyleConfig};
