use grantwell_core::engine::EngineError;
use grantwell_core::kind::ParseKindError;
use grantwell_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid {field}: '{value}'")]
    InvalidId { field: &'static str, value: String },

    #[error(transparent)]
    UnknownPermission(#[from] ParseKindError),
}

impl ApiError {
    /// True when the failure comes from bad inheritance metadata rather than
    /// an unavailable collaborator.
    pub fn is_inheritance_defect(&self) -> bool {
        let mut current = match self {
            ApiError::Engine(e) => e,
            _ => return false,
        };
        loop {
            match current {
                EngineError::Inheritance(_) => return true,
                EngineError::MemberRecalculation { source, .. } => current = source,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwell_core::inheritance::InheritanceError;
    use grantwell_core::kind::PermissionKind;
    use grantwell_core::model::UserId;

    #[test]
    fn api_error_from_engine_error() {
        let api_err: ApiError = EngineError::Storage("connection reset".to_string()).into();

        assert!(
            api_err.to_string().contains("connection reset"),
            "expected cause in error message, got: {api_err}"
        );
        assert!(!api_err.is_inheritance_defect());
    }

    #[test]
    fn api_error_from_storage_error() {
        let api_err: ApiError = StorageError::NotFound("group 42".to_string()).into();

        assert!(
            api_err.to_string().contains("group 42"),
            "expected 'group 42' in error message, got: {api_err}"
        );
    }

    #[test]
    fn unknown_permission_names_the_input() {
        let parse_err = "fly_planes".parse::<PermissionKind>().unwrap_err();
        let api_err: ApiError = parse_err.into();

        assert!(api_err.to_string().contains("fly_planes"), "got: {api_err}");
    }

    #[test]
    fn invalid_id_names_the_field() {
        let api_err = ApiError::InvalidId {
            field: "user_id",
            value: "not-a-uuid".to_string(),
        };

        assert_eq!(api_err.to_string(), "invalid user_id: 'not-a-uuid'");
    }

    #[test]
    fn inheritance_defect_is_found_through_member_wrapping() {
        let cycle = EngineError::Inheritance(InheritanceError::Cycle {
            path: vec![PermissionKind::Admin, PermissionKind::ManageUsers, PermissionKind::Admin],
        });
        let wrapped = ApiError::Engine(EngineError::MemberRecalculation {
            user_id: UserId::new(uuid::Uuid::nil()),
            source: Box::new(cycle),
        });

        assert!(wrapped.is_inheritance_defect());
    }
}
