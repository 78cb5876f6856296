use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid value {value:?}, expected one of {expected}")]
    InvalidArgument { value: String, expected: String },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("unmapped {kind} {raw:?}")]
    UnmappedEntity { kind: EntityKind, raw: String },

    #[error("inconsistent match {match_id}: {reason}")]
    InconsistentRecord { match_id: i64, reason: String },

    #[error("shape mismatch: {left} vs {right}")]
    ShapeMismatch { left: String, right: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(value: impl Into<String>, valid: &[&str]) -> Self {
        Self::InvalidArgument {
            value: value.into(),
            expected: format!("[{}]", valid.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    League,
    Team,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::League => write!(f, "league"),
            EntityKind::Team => write!(f, "team"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn invalid_argument_names_value_and_valid_set() {
        let err = EngineError::invalid("homes", &["home", "away", "overall"]);
        assert_eq!(
            err.to_string(),
            "invalid value \"homes\", expected one of [home, away, overall]"
        );
    }
}
