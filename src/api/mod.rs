// ==========================================
// 酒店预订占用引擎 - API 层
// ==========================================
// 对外编排入口: 输入校验 + 引擎委托 + 错误收敛
// ==========================================

pub mod error;
pub mod reservation_api;
pub mod room_api;

pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use reservation_api::{CreateReservationRequest, ReservationApi};
pub use room_api::{RoomApi, RoomView};
