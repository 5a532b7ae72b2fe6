// ==========================================
// 酒店预订占用引擎 - 库入口
// ==========================================
// 分层:
// - domain:     领域模型 (预订/明细/入住人/客房/审计)
// - repository: 数据访问 (SQLite, 乐观锁, 单事务换房落库)
// - engine:     业务规则 (状态机/可用性/换房/甘特图/事件)
// - api:        编排入口 (输入校验 + 委托 + 错误收敛)
// - config:     钩子触发配置
// ==========================================

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod repository;

pub use api::{ApiError, ApiErrorKind, ApiResult, ReservationApi, RoomApi};
pub use domain::types::{ReservationStatus, RoomStatus};
pub use engine::{
    ReservationEvent, ReservationEventPublisher, ReservationEventType, ReservationStateMachine,
    RoomChangeOperator, RoomChangeRequest,
};

/// 应用名称
pub const APP_NAME: &str = "hotel-occupancy-engine";

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
