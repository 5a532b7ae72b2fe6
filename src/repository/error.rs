// ==========================================
// 酒店预订占用引擎 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 并发控制错误 =====
    #[error("乐观锁冲突: reservation_id={reservation_id}, expected_revision={expected}, actual_revision={actual}")]
    OptimisticLockFailure {
        reservation_id: String,
        expected: i64,
        actual: i64,
    },

    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 业务规则错误 =====
    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("占用冲突: room_id={room_id}, 区间=[{start}, {end})")]
    OccupancyConflict {
        room_id: String,
        start: String,
        end: String,
    },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },
}

/// 仓储层结果类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let message = msg.clone().unwrap_or_else(|| e.to_string());
                match e.code {
                    rusqlite::ErrorCode::ConstraintViolation => {
                        if message.contains("FOREIGN KEY") {
                            RepositoryError::ForeignKeyViolation(message)
                        } else {
                            RepositoryError::UniqueConstraintViolation(message)
                        }
                    }
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                        RepositoryError::LockError(message)
                    }
                    _ => RepositoryError::DatabaseQueryError(err.to_string()),
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}
