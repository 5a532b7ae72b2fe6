// ==========================================
// 酒店预订占用引擎 - 预订领域模型
// ==========================================
// 聚合根: Reservation (预订)
// 子记录: ReservationLine (房间明细) / GuestOccupant (入住人)
// 不变式:
// - check_out > check_in (有值时)
// - is_change_origin 与 is_change_destination 互斥
// - split_from_reservation_id 一经写入不可清除(不可变血缘)
// - nights == 0 的明细不参与占用与甘特图
// ==========================================

use crate::domain::types::ReservationStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Reservation - 预订
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,           // 预订ID (UUID)
    pub guest_name: String,               // 主客姓名
    pub hotel_id: String,                 // 所属酒店
    pub check_in: NaiveDateTime,          // 入住时间
    pub check_out: Option<NaiveDateTime>, // 退房时间 (末晚不含,半开区间)
    pub status: ReservationStatus,        // 生命周期状态
    pub total_amount: f64,                // 金额合计
    pub currency: String,                 // 币种
    pub pricelist: Option<String>,        // 价目表
    pub company: Option<String>,          // 公司
    pub agent: Option<String>,            // 代理/渠道
    pub commission_pct: f64,              // 代理佣金比例

    // ===== 换房链接 (可变) =====
    pub linked_reservation_id: Option<String>, // 换房对端预订ID
    pub is_change_origin: bool,                // 换房源预订
    pub is_change_destination: bool,           // 换房目标预订

    // ===== 换房血缘 (不可变) =====
    pub split_from_reservation_id: Option<String>, // 拆分来源预订ID

    // ===== 并发控制 =====
    pub revision: i64, // 乐观锁修订号

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Reservation {
    /// 入住日期(日粒度)
    pub fn check_in_date(&self) -> NaiveDate {
        self.check_in.date()
    }

    /// 退房日期(日粒度,半开区间右端)
    pub fn check_out_date(&self) -> Option<NaiveDate> {
        self.check_out.map(|dt| dt.date())
    }

    /// 按日期派生的夜数 (退房日不含)
    pub fn derived_nights(&self) -> i64 {
        match self.check_out_date() {
            Some(out) => (out - self.check_in_date()).num_days().max(0),
            None => 0,
        }
    }

    /// 日期不变式: check_out > check_in
    pub fn dates_are_valid(&self) -> bool {
        match self.check_out {
            Some(out) => out > self.check_in,
            None => true,
        }
    }

    /// 链接标志互斥不变式
    pub fn change_flags_are_valid(&self) -> bool {
        !(self.is_change_origin && self.is_change_destination)
    }
}

// ==========================================
// ReservationLine - 房间明细
// ==========================================
// nights 为显式存储值: 建单时按日期派生,换房时被显式覆盖
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationLine {
    pub line_id: String,        // 明细ID (UUID)
    pub reservation_id: String, // 所属预订
    pub room_id: String,        // 房间引用
    pub price: f64,             // 每晚价格
    pub original_price: f64,    // 折扣前原价 (房间牌价快照)
    pub discount_pct: f64,      // 折扣百分比
    pub nights: i64,            // 夜数 (>= 0; 0 表示不占用)
    pub created_at: NaiveDateTime,
}

impl ReservationLine {
    /// 是否贡献占用 (nights == 0 的明细不参与可用性与甘特图)
    pub fn occupies(&self) -> bool {
        self.nights > 0
    }

    /// 折扣金额 (按夜数计)
    pub fn discount_amount(&self) -> f64 {
        self.original_price * self.nights as f64 * self.discount_pct / 100.0
    }

    /// 明细小计
    pub fn subtotal(&self) -> f64 {
        self.price * self.nights as f64 * (1.0 - self.discount_pct / 100.0)
    }
}

// ==========================================
// GuestOccupant - 入住人
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestOccupant {
    pub guest_id: String, // 入住人ID (UUID)
    pub line_id: String,  // 所属房间明细
    pub name: String,     // 姓名
    pub age: Option<i32>, // 年龄
    pub is_adult: bool,   // 成人标志 (容量校验用)
}

// ==========================================
// ReservationWithLines - 预订聚合视图
// ==========================================
// 用途: 可用性引擎与甘特图聚合的统一输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationWithLines {
    pub reservation: Reservation,
    pub lines: Vec<ReservationLine>,
}

impl ReservationWithLines {
    /// 明细是否跨多个房间 (决定甘特图布局规则)
    pub fn spans_multiple_rooms(&self) -> bool {
        self.lines
            .iter()
            .any(|line| line.room_id != self.lines[0].room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn sample_reservation() -> Reservation {
        Reservation {
            reservation_id: "R1".to_string(),
            guest_name: "测试客人".to_string(),
            hotel_id: "H1".to_string(),
            check_in: dt(2024, 1, 1),
            check_out: Some(dt(2024, 1, 5)),
            status: ReservationStatus::Confirmed,
            total_amount: 400.0,
            currency: "CNY".to_string(),
            pricelist: None,
            company: None,
            agent: None,
            commission_pct: 0.0,
            linked_reservation_id: None,
            is_change_origin: false,
            is_change_destination: false,
            split_from_reservation_id: None,
            revision: 0,
            created_at: dt(2023, 12, 20),
            updated_at: dt(2023, 12, 20),
        }
    }

    #[test]
    fn test_derived_nights() {
        let r = sample_reservation();
        assert_eq!(r.derived_nights(), 4);
    }

    #[test]
    fn test_derived_nights_without_checkout() {
        let mut r = sample_reservation();
        r.check_out = None;
        assert_eq!(r.derived_nights(), 0);
        assert!(r.dates_are_valid());
    }

    #[test]
    fn test_dates_invalid_when_checkout_not_after_checkin() {
        let mut r = sample_reservation();
        r.check_out = Some(r.check_in);
        assert!(!r.dates_are_valid());
    }

    #[test]
    fn test_line_subtotal_and_discount() {
        let line = ReservationLine {
            line_id: "L1".to_string(),
            reservation_id: "R1".to_string(),
            room_id: "101".to_string(),
            price: 100.0,
            original_price: 120.0,
            discount_pct: 10.0,
            nights: 4,
            created_at: dt(2023, 12, 20),
        };
        assert!((line.subtotal() - 360.0).abs() < 1e-9);
        assert!((line.discount_amount() - 48.0).abs() < 1e-9);
        assert!(line.occupies());
    }

    #[test]
    fn test_zero_night_line_does_not_occupy() {
        let line = ReservationLine {
            line_id: "L1".to_string(),
            reservation_id: "R1".to_string(),
            room_id: "101".to_string(),
            price: 100.0,
            original_price: 100.0,
            discount_pct: 0.0,
            nights: 0,
            created_at: dt(2023, 12, 20),
        };
        assert!(!line.occupies());
    }
}
