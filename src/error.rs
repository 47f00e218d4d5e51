//! Error types shared by the pagination and PDF pipelines.
//!
//! Pagination never surfaces [`MeasureError`] to callers (it falls back to a
//! single page); the PDF pipeline surfaces [`PipelineError`], where
//! [`PipelineError::Cancelled`] is a silent outcome rather than a failure.

use thiserror::Error;

/// Failure of one PDF generation job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The job was superseded or aborted. Not a user-facing error.
    #[error("generation cancelled")]
    Cancelled,
    /// Stage A failed to turn Markdown into a print document.
    #[error("markdown conversion failed: {0}")]
    Markdown(String),
    /// Stage B failed to render or capture the offscreen frame.
    #[error("raster capture failed: {0}")]
    Raster(String),
    /// Stage C failed to assemble the PDF.
    #[error("PDF assembly failed: {0}")]
    Assembly(String),
    /// The background worker is unavailable or crashed mid-job.
    #[error("worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

/// Failure to measure content for pagination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasureError {
    #[error("layout failed: {0}")]
    Layout(String),
    #[error("measurement surface unavailable: {0}")]
    Unavailable(String),
}

impl From<taffy::TaffyError> for MeasureError {
    fn from(e: taffy::TaffyError) -> Self {
        MeasureError::Layout(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(PipelineError::Cancelled.is_cancelled());
        assert!(!PipelineError::Raster("boom".into()).is_cancelled());
    }

    #[test]
    fn messages_are_human_readable() {
        let e = PipelineError::Assembly("bad raster".into());
        assert_eq!(e.to_string(), "PDF assembly failed: bad raster");
    }
}
