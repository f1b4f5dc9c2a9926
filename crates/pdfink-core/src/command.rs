use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationList;
use crate::compositor::RenderReport;
use crate::config::{FaultPolicy, RenderOptions};
use crate::encoding::base64_bytes;

/// An export request: source PDF plus the records to draw on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCommand {
    /// Base64-encoded source PDF
    #[serde(with = "base64_bytes")]
    pub pdf: Vec<u8>,
    #[serde(default)]
    pub annotations: AnnotationList,
    /// Overrides the configured fault policy for this request
    #[serde(default)]
    pub fault_policy: Option<FaultPolicy>,
}

impl ExportCommand {
    /// `defaults` with this request's overrides applied
    pub fn render_options(&self, defaults: &RenderOptions) -> RenderOptions {
        let mut options = defaults.clone();
        if let Some(fault_policy) = self.fault_policy {
            options.fault_policy = fault_policy;
        }
        options
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

impl ProcessResult {
    pub fn ok(pdf: &[u8], metrics: ProcessMetrics) -> Self {
        Self {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(pdf)),
            metrics: Some(metrics),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub annotations_drawn: usize,
    pub annotations_skipped: usize,
    pub processing_time_ms: u64,
}

impl ProcessMetrics {
    pub fn from_report(
        input_size_bytes: usize,
        report: &RenderReport,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            input_size_bytes,
            output_size_bytes: report.pdf.len(),
            page_count: report.page_count,
            annotations_drawn: report.drawn,
            annotations_skipped: report.skipped,
            processing_time_ms,
        }
    }
}
