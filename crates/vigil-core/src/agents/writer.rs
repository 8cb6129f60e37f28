//! Writer agent (spec §4.7): persists the report, snapshots the workflow
//! into the threads repository, and optionally renders a PDF via an
//! external collaborator.

use crate::error::Result;
use crate::model::{ClientAnalysisReport, StoredReport, ThreadRecord, WorkflowState};
use crate::traits::Repository;
use async_trait::async_trait;

/// PDF rendering is an external collaborator (spec §1 non-goals); this
/// narrow trait lets the writer call it without the core depending on any
/// particular renderer. The default implementation renders nothing.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, report: &ClientAnalysisReport) -> Result<Option<String>>;
}

pub struct NoopPdfRenderer;

#[async_trait]
impl PdfRenderer for NoopPdfRenderer {
    async fn render(&self, _report: &ClientAnalysisReport) -> Result<Option<String>> {
        Ok(None)
    }
}

pub struct WriteOutcome {
    pub saved_files: Vec<String>,
}

pub async fn write(
    repository: &dyn Repository,
    pdf_renderer: &dyn PdfRenderer,
    report_id: &str,
    client_name: &str,
    inn: Option<&str>,
    report: ClientAnalysisReport,
    thread_id: &str,
    state: &WorkflowState,
) -> Result<WriteOutcome> {
    let mut stored = StoredReport::new(client_name.to_string(), inn.map(str::to_string), report.clone());
    stored.report_id = report_id.to_string();
    repository.save_report(stored).await?;

    let now = chrono::Utc::now();
    let thread = ThreadRecord {
        thread_id: thread_id.to_string(),
        thread_data: state.clone(),
        created_at: now,
        updated_at: now,
        client_name: client_name.to_string(),
        inn: inn.map(str::to_string),
    };
    repository.save_thread(thread).await?;

    let mut saved_files = Vec::new();
    if let Some(path) = pdf_renderer.render(&report).await? {
        saved_files.push(path);
    }

    Ok(WriteOutcome { saved_files })
}

/// Persists only a thread snapshot, used when the workflow failed before a
/// report existed (E2E-2: a ThreadRecord is still written with `stage=failed`).
pub async fn write_thread_only(
    repository: &dyn Repository,
    thread_id: &str,
    client_name: &str,
    inn: Option<&str>,
    state: &WorkflowState,
) -> Result<()> {
    let now = chrono::Utc::now();
    let thread = ThreadRecord {
        thread_id: thread_id.to_string(),
        thread_data: state.clone(),
        created_at: now,
        updated_at: now,
        client_name: client_name.to_string(),
        inn: inn.map(str::to_string),
    };
    repository.save_thread(thread).await
}
