use thiserror::Error;

use crate::access::HierarchyError;
use crate::auth::AuthError;
use crate::database::DatabaseError;

/// Domain-level failures raised by the services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// The mutation would leave dangling references; nothing was changed
    #[error("{0}")]
    ReferentialIntegrity(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("data integrity: {0}")]
    DataIntegrity(HierarchyError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn in_use(message: impl Into<String>) -> Self {
        ServiceError::ReferentialIntegrity(message.into())
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", what, id))
    }
}

impl From<HierarchyError> for ServiceError {
    fn from(err: HierarchyError) -> Self {
        if err.is_data_integrity() {
            ServiceError::DataIntegrity(err)
        } else {
            ServiceError::Validation(err.to_string())
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenGeneration(_) | AuthError::Hashing(_) => ServiceError::Internal(err.to_string()),
            AuthError::Expired | AuthError::InvalidToken(_) | AuthError::WrongKind { .. } => {
                ServiceError::Unauthenticated(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_errors_split_by_cause() {
        assert!(matches!(
            ServiceError::from(HierarchyError::SelfParent { id: 1 }),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            ServiceError::from(HierarchyError::WouldCycle { id: 1, parent_id: 2 }),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            ServiceError::from(HierarchyError::Cycle { id: 1 }),
            ServiceError::DataIntegrity(_)
        ));
    }

    #[test]
    fn token_problems_are_authentication_failures() {
        assert!(matches!(ServiceError::from(AuthError::Expired), ServiceError::Unauthenticated(_)));
        assert!(matches!(
            ServiceError::from(AuthError::Hashing("boom".into())),
            ServiceError::Internal(_)
        ));
    }
}
