// ==========================================
// 酒店预订占用引擎 - 领域类型定义
// ==========================================
// 预订状态机的状态集与每状态元数据
// 红线: 状态元数据是固定查表,不做子类化/动态分发
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 预订状态 (Reservation Status)
// ==========================================
// 序列化格式: snake_case (与数据库/前端一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Initial,        // 草稿
    Confirmed,      // 已确认
    Checkin,        // 已入住
    Checkout,       // 已退房
    CleaningNeeded, // 待清洁
    RoomReady,      // 房间就绪
    Cancelled,      // 已取消
    NoShow,         // 未到店
}

impl ReservationStatus {
    /// 全部状态（用于状态机矩阵测试与校验）
    pub const ALL: [ReservationStatus; 8] = [
        ReservationStatus::Initial,
        ReservationStatus::Confirmed,
        ReservationStatus::Checkin,
        ReservationStatus::Checkout,
        ReservationStatus::CleaningNeeded,
        ReservationStatus::RoomReady,
        ReservationStatus::Cancelled,
        ReservationStatus::NoShow,
    ];

    /// 转换为数据库存储字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Initial => "initial",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Checkin => "checkin",
            ReservationStatus::Checkout => "checkout",
            ReservationStatus::CleaningNeeded => "cleaning_needed",
            ReservationStatus::RoomReady => "room_ready",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::NoShow => "no_show",
        }
    }

    /// 每状态元数据（固定查表）
    pub fn meta(&self) -> &'static StateMeta {
        match self {
            ReservationStatus::Initial => &StateMeta {
                label: "草稿",
                color: "secondary",
                requires_room: false,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::Confirmed => &StateMeta {
                label: "已确认",
                color: "info",
                requires_room: false,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::Checkin => &StateMeta {
                label: "已入住",
                color: "success",
                requires_room: true,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::Checkout => &StateMeta {
                label: "已退房",
                color: "primary",
                requires_room: true,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::CleaningNeeded => &StateMeta {
                label: "待清洁",
                color: "warning",
                requires_room: true,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::RoomReady => &StateMeta {
                label: "房间就绪",
                color: "success",
                requires_room: true,
                is_terminal_pending_reset: false,
            },
            ReservationStatus::Cancelled => &StateMeta {
                label: "已取消",
                color: "danger",
                requires_room: false,
                is_terminal_pending_reset: true,
            },
            ReservationStatus::NoShow => &StateMeta {
                label: "未到店",
                color: "danger",
                requires_room: false,
                is_terminal_pending_reset: true,
            },
        }
    }

    /// 当前状态允许的目标状态列表（状态机转移表）
    ///
    /// 说明:
    /// - room_ready → confirmed: 房间被一笔全新预订复用
    /// - cancelled / no_show → initial: 显式重置后才可复用记录
    pub fn allowed_targets(&self) -> &'static [ReservationStatus] {
        match self {
            ReservationStatus::Initial => {
                &[ReservationStatus::Confirmed, ReservationStatus::Cancelled]
            }
            ReservationStatus::Confirmed => &[
                ReservationStatus::Checkin,
                ReservationStatus::Cancelled,
                ReservationStatus::NoShow,
            ],
            ReservationStatus::Checkin => {
                &[ReservationStatus::Checkout, ReservationStatus::Cancelled]
            }
            ReservationStatus::Checkout => &[ReservationStatus::CleaningNeeded],
            ReservationStatus::CleaningNeeded => &[ReservationStatus::RoomReady],
            ReservationStatus::RoomReady => &[ReservationStatus::Confirmed],
            ReservationStatus::Cancelled => &[ReservationStatus::Initial],
            ReservationStatus::NoShow => &[ReservationStatus::Initial],
        }
    }

    /// 是否参与占用冲突检查
    ///
    /// cancelled / no_show 不占房; room_ready 表示住宿已结束,
    /// 房间对新预订开放（旧记录仅作历史保留）
    pub fn occupies_room(&self) -> bool {
        !matches!(
            self,
            ReservationStatus::Cancelled
                | ReservationStatus::NoShow
                | ReservationStatus::RoomReady
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(ReservationStatus::Initial),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "checkin" => Ok(ReservationStatus::Checkin),
            "checkout" => Ok(ReservationStatus::Checkout),
            "cleaning_needed" => Ok(ReservationStatus::CleaningNeeded),
            "room_ready" => Ok(ReservationStatus::RoomReady),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "no_show" => Ok(ReservationStatus::NoShow),
            other => Err(format!("未知的预订状态: {}", other)),
        }
    }
}

// ==========================================
// StateMeta - 每状态元数据
// ==========================================
// 用途: 状态机守卫条件 + UI 展示
#[derive(Debug, Clone, Serialize)]
pub struct StateMeta {
    pub label: &'static str,              // 展示名称
    pub color: &'static str,              // 甘特图颜色标识
    pub requires_room: bool,              // 该状态要求至少一条房间明细
    pub is_terminal_pending_reset: bool,  // 终态(需显式重置回 initial 才可复用)
}

// ==========================================
// 房间计算状态 (Room Computed Status)
// ==========================================
// 由可用性引擎 + 状态机派生,不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,         // 空闲
    AvailableReusable, // 空闲(存在可复用的 room_ready 记录)
    Occupied,          // 当前有客
    Reserved,          // 有未来预订
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Available => write!(f, "available"),
            RoomStatus::AvailableReusable => write!(f, "available_reusable"),
            RoomStatus::Occupied => write!(f, "occupied"),
            RoomStatus::Reserved => write!(f, "reserved"),
        }
    }
}
