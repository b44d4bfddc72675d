use ulid::Ulid;

#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    /// The acting user may not touch this entity.
    Forbidden(Ulid),
    /// Requested dates overlap the existing reservation `existing`.
    Conflict {
        existing: Ulid,
    },
    PriceMismatch {
        expected: u64,
        submitted: u64,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(id) => write!(f, "not permitted on: {id}"),
            EngineError::Conflict { existing } => {
                write!(f, "dates conflict with reservation: {existing}")
            }
            EngineError::PriceMismatch { expected, submitted } => {
                write!(f, "total price {submitted} does not match quoted price {expected}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
