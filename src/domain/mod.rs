// ==========================================
// 酒店预订占用引擎 - 领域层
// ==========================================

pub mod action_log;
pub mod reservation;
pub mod room;
pub mod side_records;
pub mod types;

pub use action_log::TransitionLog;
pub use reservation::{GuestOccupant, Reservation, ReservationLine, ReservationWithLines};
pub use room::Room;
pub use side_records::{SaleDocument, ServiceLine};
pub use types::{ReservationStatus, RoomStatus, StateMeta};
