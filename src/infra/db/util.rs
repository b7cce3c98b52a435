use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// SQLSTATE codes caused by the values a caller sent rather than by the
/// database: `numeric_value_out_of_range` and `string_data_right_truncation`.
const REJECTED_VALUE_CODES: [&str; 2] = ["22003", "22001"];

fn is_rejected_value(code: Option<&str>) -> bool {
    code.is_some_and(|code| REJECTED_VALUE_CODES.contains(&code))
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            ErrorKind::ForeignKeyViolation | ErrorKind::NotNullViolation => {
                RepoError::InvalidInput {
                    message: db.message().to_string(),
                }
            }
            ErrorKind::CheckViolation => RepoError::Integrity {
                message: db.message().to_string(),
            },
            _ if db.code().as_deref() == Some(QUERY_CANCELED) => RepoError::Timeout,
            _ if is_rejected_value(db.code().as_deref())
                || db.message().contains("invalid input syntax") =>
            {
                RepoError::InvalidInput {
                    message: db.message().to_string(),
                }
            }
            _ => RepoError::from_persistence(db),
        },
        other => RepoError::from_persistence(other),
    }
}
