use std::{fmt, sync::Mutex};

use crate::DType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Human-readable explanation of why a comparison failed or looked suspicious.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    NotATensor {
        type_name: String,
    },
    ShapeMismatch {
        reference: Vec<usize>,
        candidate: Vec<usize>,
    },
    DtypeMismatch {
        reference: DType,
        candidate: DType,
    },
    ValueMismatch {
        max_abs_diff: f64,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DtypeMismatch { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotATensor { type_name } => {
                write!(f, "implementation output is not a tensor, got {type_name}")
            }
            Self::ShapeMismatch {
                reference,
                candidate,
            } => write!(
                f,
                "shape mismatch - reference: {reference:?}, implementation: {candidate:?}"
            ),
            Self::DtypeMismatch {
                reference,
                candidate,
            } => write!(
                f,
                "dtype mismatch - reference: {reference}, implementation: {candidate}"
            ),
            Self::ValueMismatch { max_abs_diff } => {
                write!(f, "output mismatch - max difference: {max_abs_diff}")
            }
        }
    }
}

/// Where the matcher reports what it found.
pub trait DiagnosticSink {
    fn emit(&self, diagnostic: &Diagnostic);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn emit(&self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic)
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.lock().push(diagnostic.clone());
    }
}
