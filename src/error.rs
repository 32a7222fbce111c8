use thiserror::Error;

/// Failure taxonomy for the order lifecycle engine.
///
/// Client faults (`Validation`, `NotFound`, `Authorization`, `Conflict`,
/// `PaymentDeclined`) are rejected before any side effect. Server faults
/// (`PaymentGateway`, `Storage`) may occur mid-operation and trigger the
/// engine's compensating actions before being surfaced.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The processor declined the payment method. Carries the decline
    /// reason verbatim; this is the only processor detail we pass through.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// The processor was unreachable or returned an unexpected error.
    /// Distinct from a decline so callers know a retry may succeed.
    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The order transition committed but the audit append failed.
    /// Surfaced as its own kind so the gap is observable, never swallowed.
    #[error("transition committed but audit write failed: {0}")]
    AuditUnrecorded(String),

    /// Interface slot reserved for future settlement policy.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrderError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PaymentGateway(_) | Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
