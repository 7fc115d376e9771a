/// Failures shared by every commerce operation.
///
/// All variants except `Storage` are recoverable and describe the caller's
/// problem; `Storage` carries backend detail that must only be logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Your cart is empty.")]
    EmptyCart,

    #[error("Insufficient stock for {item}. Only {available} available.")]
    InsufficientStock {
        item: String,
        available: i32,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Cart is {status}, only open carts can be changed")]
    NotOpen {
        status: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable machine-readable identifier reported to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::EmptyCart => "empty_cart",
            CoreError::InsufficientStock { .. } => "insufficient_stock",
            CoreError::NotFound(_) => "not_found",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::NotOpen { .. } => "not_open",
            CoreError::Validation(_) => "validation",
            CoreError::Conflict(_) => "conflict",
            CoreError::Storage(_) => "internal",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::Storage(_))
    }

    /// Wrap a backend failure. The detail is logged once, where the error
    /// leaves the process.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock { item: "Jersey".to_string(), available: 2 };
        assert_eq!(err.to_string(), "Insufficient stock for Jersey. Only 2 available.");
        assert_eq!(err.kind(), "insufficient_stock");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_storage_is_not_recoverable() {
        let err = CoreError::storage("connection reset");
        assert_eq!(err.kind(), "internal");
        assert!(!err.is_recoverable());
    }
}
