//! Error types and handling for Tessera

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Error taxonomy for the resource kernel.
///
/// Every manager method surfaces its failure through one of these variants;
/// nothing is swallowed. Create-callback failures roll the reservation back
/// fully before the error propagates.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// Request validation failures (zero sizes, invalid handles, missing fields)
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument { parameter: String, message: String },

    /// Operation forbidden by the current lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// A slot pool is exhausted after its growth attempt
    #[error("Out of capacity: {pool} (capacity {capacity})")]
    OutOfCapacity { pool: String, capacity: usize },

    /// The backing allocator cannot satisfy a region request
    #[error("Out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    /// Handle generation mismatch or slot not created
    #[error("Handle expired: {message}")]
    HandleExpired { message: String },

    /// The component has not been configured yet
    #[error("Not configured: {component}")]
    NotConfigured { component: String },

    /// A backend slow-op returned null or failed
    #[error("Backend failure: {message}")]
    BackendFailure { message: String },
}

impl TesseraError {
    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an out of capacity error
    pub fn out_of_capacity(pool: impl Into<String>, capacity: usize) -> Self {
        Self::OutOfCapacity {
            pool: pool.into(),
            capacity,
        }
    }

    /// Create an out of memory error
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create a handle expired error
    pub fn handle_expired(message: impl Into<String>) -> Self {
        Self::HandleExpired {
            message: message.into(),
        }
    }

    /// Create a not configured error
    pub fn not_configured(component: impl Into<String>) -> Self {
        Self::NotConfigured {
            component: component.into(),
        }
    }

    /// Create a backend failure error
    pub fn backend_failure(message: impl Into<String>) -> Self {
        Self::BackendFailure {
            message: message.into(),
        }
    }
}
