// ==========================================
// 酒店预订占用引擎 - 账务附属记录
// ==========================================
// ServiceLine: 手工服务/杂项消费行 (未开票的可在换房时整体移动)
// SaleDocument: 销售/开票单据引用 (换房时重指向目标预订,账务归集)
// 红线: 移动是"重指向 owning reservation",不是复制,避免重复计费
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ServiceLine - 服务消费行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: String,     // 服务行ID (UUID)
    pub reservation_id: String, // 所属预订 (换房时可被重指向)
    pub name: String,           // 服务名称
    pub amount: f64,            // 金额
    pub invoiced: bool,         // 已开票 (已开票的行不再移动)
    pub created_at: NaiveDateTime,
}

// ==========================================
// SaleDocument - 销售单据引用
// ==========================================
// 引擎只维护归属关系; 单据内容由外部开票系统负责
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDocument {
    pub document_id: String,    // 单据ID
    pub reservation_id: String, // 所属预订 (换房时重指向目标)
    pub name: String,           // 单据编号/名称
    pub state: String,          // 单据状态 (draft/posted 等,外部语义)
    pub created_at: NaiveDateTime,
}
