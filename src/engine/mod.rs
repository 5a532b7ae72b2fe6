// ==========================================
// 酒店预订占用引擎 - 引擎层
// ==========================================
// 业务规则所在层: 状态机 / 可用性 / 换房 / 甘特图聚合 / 事件
// 仓储只管数据访问,API 只管编排,规则集中在这里
// ==========================================

pub mod availability;
pub mod events;
pub mod gantt;
pub mod room_change;
pub mod state_machine;

pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, ReservationEvent, ReservationEventPublisher,
    ReservationEventType,
};
pub use gantt::{GanttSegment, SegmentLayout};
pub use room_change::{RoomChangeError, RoomChangeOperator, RoomChangeOutcome, RoomChangeRequest};
pub use state_machine::{ReservationStateMachine, StateMachineError, TransitionOutcome};
