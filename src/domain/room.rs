// ==========================================
// 酒店预订占用引擎 - 客房目录领域模型
// ==========================================
// 外部协作方实体: 引擎只读,不负责维护房态之外的数据
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Room - 客房
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,   // 房间ID
    pub name: String,      // 房间名称 (如 "101")
    pub hotel_id: String,  // 所属酒店
    pub list_price: f64,   // 牌价 (每晚)
    pub max_adult: i32,    // 最大成人数
    pub max_child: i32,    // 最大儿童数
}

impl Room {
    /// 总容量 (成人 + 儿童)
    pub fn capacity(&self) -> i32 {
        self.max_adult + self.max_child
    }
}
