//! Build diagnostics and the per-processor logger.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::symbols::Symbol;

/// A diagnostic collected into the build report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Reporting processor; `None` for engine diagnostics.
    pub processor: Option<String>,
    /// Qualified name of the symbol the diagnostic is about.
    pub symbol: Option<String>,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            processor: None,
            symbol: None,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    pub fn with_symbol(mut self, symbol: &Symbol) -> Self {
        self.symbol = Some(symbol.qualified_name().to_string());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(processor) = &self.processor {
            write!(f, "[{processor}]")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(symbol) = &self.symbol {
            write!(f, " ({symbol})")?;
        }
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        for hint in &self.hints {
            write!(f, "\n  = hint: {hint}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Collects one processor's diagnostics during a `process` or `finish` call.
#[derive(Debug)]
pub struct Logger {
    processor: String,
    sink: Mutex<Vec<Diagnostic>>,
}

impl Logger {
    pub fn new(processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            sink: Mutex::new(Vec::new()),
        }
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_processor(self.processor.clone());
        match diagnostic.severity {
            Severity::Info => tracing::info!(processor = %self.processor, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(processor = %self.processor, "{}", diagnostic.message),
            Severity::Error => tracing::error!(processor = %self.processor, "{}", diagnostic.message),
        }
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).push(diagnostic);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.report(Diagnostic::new(Severity::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>, symbol: Option<&Symbol>) {
        let mut diagnostic = Diagnostic::warning(message);
        if let Some(symbol) = symbol {
            diagnostic = diagnostic.with_symbol(symbol);
        }
        self.report(diagnostic);
    }

    pub fn error(&self, message: impl Into<String>, symbol: Option<&Symbol>) {
        let mut diagnostic = Diagnostic::error(message);
        if let Some(symbol) = symbol {
            diagnostic = diagnostic.with_symbol(symbol);
        }
        self.report(diagnostic);
    }

    pub(crate) fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.sink.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

// ============================================================================
// Diagnostic catalog: engine-reported problems
// ============================================================================

pub mod catalog {
    use super::*;

    /// One deferred symbol left when processing stopped.
    pub fn still_deferred(processor: &str, symbol: &str, reason: &str, since_round: u32) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: format!("symbol was never processed: {reason}"),
            processor: Some(processor.to_string()),
            symbol: Some(symbol.to_string()),
            notes: vec![format!("deferred since round {since_round}")],
            hints: Vec::new(),
        }
    }

    pub fn not_converged(deferred: usize) -> Diagnostic {
        Diagnostic::error(format!(
            "processing did not converge: {deferred} deferred symbol(s) remain after the last round"
        ))
        .with_hint("a processor keeps deferring symbols whose dependencies are never generated")
    }

    pub fn promoted_warning(warning: Diagnostic) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            ..warning
        }
        .with_note("warnings are treated as errors")
    }
}
