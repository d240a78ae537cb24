//! Diagnostic collection.
//!
//! The builder and inference hooks report problems through a
//! `DiagContext`, which accumulates `codespan` diagnostics for the caller
//! to render (or inspect in tests). Fatal structural misuse records an
//! error diagnostic and returns the corresponding `IrError`; inference
//! weaknesses record non-fatal diagnostics and construction continues.

use crate::error::IrError;
use crate::span::Span;
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

type FileId = usize;

#[derive(Debug, Default)]
pub struct DiagContext {
    file_id: FileId,
    diagnostics: Vec<Diagnostic<FileId>>,
}

impl DiagContext {
    pub fn new() -> Self {
        DiagContext::default()
    }

    /// Attach diagnostics to a specific file id in the caller's file
    /// database.
    pub fn with_file(file_id: FileId) -> Self {
        DiagContext {
            file_id,
            diagnostics: Vec::new(),
        }
    }

    pub fn emit(&mut self, severity: Severity, span: Span, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(severity)
                .with_message(message)
                .with_labels(vec![Label::primary(self.file_id, span.start..span.end)]),
        );
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.emit(Severity::Error, span, message);
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.emit(Severity::Warning, span, message);
    }

    /// Record a fatal diagnostic and hand the error back so call sites
    /// read `return Err(self.diag.fatal(span, err))`.
    pub fn fatal(&mut self, span: Span, err: IrError) -> IrError {
        self.error(span, err.to_string());
        err
    }

    pub fn diagnostics(&self) -> &[Diagnostic<FileId>] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic<FileId>> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.severity, Severity::Bug | Severity::Error))
    }
}
