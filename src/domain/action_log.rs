// ==========================================
// 酒店预订占用引擎 - 状态流转审计日志
// ==========================================
// 红线: 所有状态写入必须记录 (操作人/时间/旧状态/新状态)
// ==========================================

use crate::domain::types::ReservationStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// TransitionLog - 流转日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionLog {
    pub log_id: String,                // 日志ID (UUID)
    pub reservation_id: String,        // 关联预订
    pub actor: String,                 // 操作人
    pub old_status: ReservationStatus, // 旧状态
    pub new_status: ReservationStatus, // 新状态
    pub detail: Option<String>,        // 详细描述 (如换房上下文)
    pub logged_at: NaiveDateTime,      // 记录时间
}
