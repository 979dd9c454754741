use thiserror::Error;

/// Hard failures. Everything recoverable is reported as a
/// [`Diagnostic`](crate::diagnostics::Diagnostic) instead.
#[derive(Debug, Error)]
pub enum KpiError {
    #[error("could not decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiError>;
