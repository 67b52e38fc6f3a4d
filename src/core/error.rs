use thiserror::Error;

/// Errors returned by every store operation.
///
/// `Display` prints only the message; callers that need the stable error code
/// use [`DbError::code`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    ConditionCheckFail(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    ParseError(String),

    #[error("{0}")]
    Unavailable(String),
}

impl DbError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) | Self::TypeMismatch(_) | Self::ParseError(_) => {
                "OTSParameterInvalid"
            }
            Self::NotFound(_) => "OTSObjectNotExist",
            Self::AlreadyExists(_) => "OTSObjectAlreadyExist",
            Self::ConditionCheckFail(_) => "OTSConditionCheckFail",
            Self::Unavailable(_) => "OTSServerUnavailable",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub(crate) fn table_not_found() -> Self {
        Self::NotFound("Requested table does not exist.".into())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message_only() {
        let err = DbError::invalid("Number of index per table exceeds the quota:5.");
        assert_eq!(err.to_string(), "Number of index per table exceeds the quota:5.");
        assert_eq!(err.code(), "OTSParameterInvalid");
    }

    #[test]
    fn test_codes() {
        assert_eq!(DbError::table_not_found().code(), "OTSObjectNotExist");
        assert_eq!(
            DbError::ConditionCheckFail("Condition check failed.".into()).code(),
            "OTSConditionCheckFail"
        );
    }
}
