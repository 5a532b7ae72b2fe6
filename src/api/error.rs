// ==========================================
// 酒店预订占用引擎 - API 层错误类型
// ==========================================
// 对外统一错误面: 引擎/仓储错误在这里收敛成稳定的错误类别,
// 调用方按类别处理 (serde 序列化为 {kind, message})
// ==========================================

use crate::engine::room_change::RoomChangeError;
use crate::engine::state_machine::StateMachineError;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// API 层错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    // ===== 状态机 =====
    InvalidTransition,
    MissingRoomAssignment,
    DateInconsistency,
    // ===== 换房 =====
    RoomUnavailable,
    InvalidDateRange,
    SameRoomSelected,
    // ===== 通用 =====
    InvalidInput,
    NotFound,
    BusinessRuleViolation,
    VersionConflict,
    DatabaseError,
    TransientError,
}

/// API 层错误
#[derive(Error, Debug, Serialize)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::BusinessRuleViolation, message)
    }
}

/// API 层结果类型别名
pub type ApiResult<T> = Result<T, ApiError>;

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let kind = match &err {
            RepositoryError::OptimisticLockFailure { .. } => ApiErrorKind::VersionConflict,
            RepositoryError::NotFound { .. } => ApiErrorKind::NotFound,
            RepositoryError::OccupancyConflict { .. } => ApiErrorKind::RoomUnavailable,
            RepositoryError::BusinessRuleViolation(_) => ApiErrorKind::BusinessRuleViolation,
            RepositoryError::ValidationError(_) | RepositoryError::FieldValueError { .. } => {
                ApiErrorKind::InvalidInput
            }
            RepositoryError::LockError(_) => ApiErrorKind::TransientError,
            _ => ApiErrorKind::DatabaseError,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<StateMachineError> for ApiError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::InvalidTransition { .. } => {
                Self::new(ApiErrorKind::InvalidTransition, err.to_string())
            }
            StateMachineError::MissingRoomAssignment { .. } => {
                Self::new(ApiErrorKind::MissingRoomAssignment, err.to_string())
            }
            StateMachineError::DateInconsistency(_) => {
                Self::new(ApiErrorKind::DateInconsistency, err.to_string())
            }
            StateMachineError::NotFound(_) => Self::new(ApiErrorKind::NotFound, err.to_string()),
            StateMachineError::Repository(inner) => inner.into(),
        }
    }
}

impl From<RoomChangeError> for ApiError {
    fn from(err: RoomChangeError) -> Self {
        match err {
            RoomChangeError::RoomUnavailable { .. } => {
                Self::new(ApiErrorKind::RoomUnavailable, err.to_string())
            }
            RoomChangeError::InvalidDateRange(_) => {
                Self::new(ApiErrorKind::InvalidDateRange, err.to_string())
            }
            RoomChangeError::SameRoomSelected { .. } => {
                Self::new(ApiErrorKind::SameRoomSelected, err.to_string())
            }
            RoomChangeError::NotFound(_)
            | RoomChangeError::LineNotFound(_)
            | RoomChangeError::RoomNotFound(_) => {
                Self::new(ApiErrorKind::NotFound, err.to_string())
            }
            RoomChangeError::BusinessRule(_) => {
                Self::new(ApiErrorKind::BusinessRuleViolation, err.to_string())
            }
            RoomChangeError::Repository(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ReservationStatus;

    #[test]
    fn test_state_machine_error_maps_to_kind() {
        let err: ApiError = StateMachineError::InvalidTransition {
            from: ReservationStatus::Checkout,
            to: ReservationStatus::Checkin,
        }
        .into();
        assert_eq!(err.kind, ApiErrorKind::InvalidTransition);
        assert!(err.message.contains("checkout"));
    }

    #[test]
    fn test_occupancy_conflict_maps_to_room_unavailable() {
        let err: ApiError = RepositoryError::OccupancyConflict {
            room_id: "102".to_string(),
            start: "2024-01-03".to_string(),
            end: "2024-01-07".to_string(),
        }
        .into();
        assert_eq!(err.kind, ApiErrorKind::RoomUnavailable);
    }

    #[test]
    fn test_optimistic_lock_maps_to_version_conflict() {
        let err: ApiError = RepositoryError::OptimisticLockFailure {
            reservation_id: "R1".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.kind, ApiErrorKind::VersionConflict);
    }
}
