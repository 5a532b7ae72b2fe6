// ==========================================
// 酒店预订占用引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod guest_repo;
pub mod reservation_repo;
pub mod room_repo;
pub mod side_record_repo;

pub use action_log_repo::TransitionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use guest_repo::GuestRepository;
pub use reservation_repo::{ReservationRepository, RoomChangeWrite};
pub use room_repo::RoomRepository;
pub use side_record_repo::SideRecordRepository;
