// ==========================================
// 酒店预订占用引擎 - 甘特图聚合
// ==========================================
// 职责: 把预订明细展开成按房间的时间条, 供占用甘特板渲染
// 布局规则按预订是否跨房间二选一,整单统一:
// - SingleRoom: 明细顺排, 半开区间 [start, start + nights)
// - RoomChange: 第一条明细末日 = start + nights - 1;
//   后续明细 start = check_in + 之前明细夜数和, 末日 = start + nights - 2
//   (换房日当晚记入目标条, 渲染端按含末日绘制)
// nights <= 0 的明细不出条, 但仍计入偏移和, 且不改变按位置定的修正量
// ==========================================

use crate::domain::reservation::ReservationWithLines;
use crate::domain::types::ReservationStatus;
use chrono::{Days, NaiveDate};
use serde::Serialize;

// ==========================================
// SegmentLayout - 布局规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentLayout {
    /// 单房间预订: 顺排, 右端不含
    SingleRoom,
    /// 跨房间预订 (换房拆分): 含末日布局, 边界向目标条让渡
    RoomChange,
}

impl SegmentLayout {
    /// 整单统一判定布局规则
    pub fn resolve(booking: &ReservationWithLines) -> Self {
        if booking.spans_multiple_rooms() {
            SegmentLayout::RoomChange
        } else {
            SegmentLayout::SingleRoom
        }
    }
}

// ==========================================
// GanttSegment - 甘特图时间条
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct GanttSegment {
    pub reservation_id: String,
    pub line_id: String,
    pub room_id: String,
    /// 条起始日 (含)
    pub date_start: NaiveDate,
    /// 条结束日 (SingleRoom 不含, RoomChange 含)
    pub date_end: NaiveDate,
    pub status: ReservationStatus,
    pub guest_name: String,
    pub total_amount: f64,
    pub currency: String,
    pub is_change_origin: bool,
    pub is_change_destination: bool,
    pub linked_reservation_id: Option<String>,
}

/// 构建甘特图时间条
///
/// # 参数
/// - `window_start` / `window_end`: 可见窗口 [start, end), 不相交的条被剔除
/// - `room_filter`: 只保留指定房间的条
/// - `bookings`: 窗口内预订快照 (调用方已排除 cancelled / room_ready)
pub fn build(
    window_start: NaiveDate,
    window_end: NaiveDate,
    room_filter: Option<&str>,
    bookings: &[ReservationWithLines],
) -> Vec<GanttSegment> {
    let mut segments = Vec::new();

    for booking in bookings {
        let layout = SegmentLayout::resolve(booking);
        let reservation = &booking.reservation;
        let check_in = reservation.check_in_date();

        // 偏移累计包含被跳过的 0 夜明细
        let mut prior_nights: i64 = 0;

        for (idx, line) in booking.lines.iter().enumerate() {
            let nights = line.nights;
            if nights <= 0 {
                prior_nights += nights.max(0);
                continue;
            }

            let start = add_days(check_in, prior_nights);
            let (date_start, date_end, end_exclusive) = match layout {
                SegmentLayout::SingleRoom => {
                    let end = add_days(start, nights);
                    (start, end, end)
                }
                SegmentLayout::RoomChange => {
                    // 修正量按明细位置取, 与前面是否出过条无关
                    let trim = if idx == 0 { 1 } else { 2 };
                    let end = add_days(start, (nights - trim).max(0));
                    // 含末日, 窗口剔除按末日次日计
                    (start, end, add_days(end, 1))
                }
            };
            prior_nights += nights;

            if let Some(room) = room_filter {
                if line.room_id != room {
                    continue;
                }
            }
            if !(date_start < window_end && end_exclusive > window_start) {
                continue;
            }

            segments.push(GanttSegment {
                reservation_id: reservation.reservation_id.clone(),
                line_id: line.line_id.clone(),
                room_id: line.room_id.clone(),
                date_start,
                date_end,
                status: reservation.status,
                guest_name: reservation.guest_name.clone(),
                total_amount: reservation.total_amount,
                currency: reservation.currency.clone(),
                is_change_origin: reservation.is_change_origin,
                is_change_destination: reservation.is_change_destination,
                linked_reservation_id: reservation.linked_reservation_id.clone(),
            });
        }
    }

    segments.sort_by(|a, b| {
        (a.room_id.as_str(), a.date_start, a.reservation_id.as_str()).cmp(&(
            b.room_id.as_str(),
            b.date_start,
            b.reservation_id.as_str(),
        ))
    });
    segments
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64)).unwrap_or(date)
    } else {
        date.checked_sub_days(Days::new((-days) as u64)).unwrap_or(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::{Reservation, ReservationLine};
    use chrono::NaiveDateTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dt(y: i32, m: u32, day: u32) -> NaiveDateTime {
        d(y, m, day).and_hms_opt(14, 0, 0).unwrap()
    }

    fn line(id: &str, room: &str, nights: i64) -> ReservationLine {
        ReservationLine {
            line_id: id.to_string(),
            reservation_id: "R1".to_string(),
            room_id: room.to_string(),
            price: 100.0,
            original_price: 100.0,
            discount_pct: 0.0,
            nights,
            created_at: dt(2023, 12, 1),
        }
    }

    fn booking(
        check_in: NaiveDate,
        check_out: NaiveDate,
        lines: Vec<ReservationLine>,
    ) -> ReservationWithLines {
        ReservationWithLines {
            reservation: Reservation {
                reservation_id: "R1".to_string(),
                guest_name: "客人".to_string(),
                hotel_id: "H1".to_string(),
                check_in: check_in.and_hms_opt(14, 0, 0).unwrap(),
                check_out: Some(check_out.and_hms_opt(12, 0, 0).unwrap()),
                status: ReservationStatus::Checkin,
                total_amount: 0.0,
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
                created_at: dt(2023, 12, 1),
                updated_at: dt(2023, 12, 1),
            },
            lines,
        }
    }

    #[test]
    fn test_single_room_sequential_exclusive_end() {
        let bookings = vec![booking(
            d(2024, 1, 1),
            d(2024, 1, 5),
            vec![line("L1", "101", 4)],
        )];
        let segments = build(d(2024, 1, 1), d(2024, 2, 1), None, &bookings);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].date_start, d(2024, 1, 1));
        assert_eq!(segments[0].date_end, d(2024, 1, 5));
    }

    #[test]
    fn test_room_change_layout_trims_boundaries() {
        // 跨房间: 首条 [1/1, 1/2] (2夜 → 末日 start+1), 次条 [1/3, 1/4] (3夜 → 末日 start+1)
        let bookings = vec![booking(
            d(2024, 1, 1),
            d(2024, 1, 6),
            vec![line("L1", "101", 2), line("L2", "102", 3)],
        )];
        let segments = build(d(2024, 1, 1), d(2024, 2, 1), None, &bookings);
        assert_eq!(segments.len(), 2);

        let first = segments.iter().find(|s| s.room_id == "101").unwrap();
        assert_eq!(first.date_start, d(2024, 1, 1));
        assert_eq!(first.date_end, d(2024, 1, 2));

        let second = segments.iter().find(|s| s.room_id == "102").unwrap();
        assert_eq!(second.date_start, d(2024, 1, 3));
        assert_eq!(second.date_end, d(2024, 1, 4));
    }

    #[test]
    fn test_zero_night_line_skipped_but_counted_in_offset() {
        let bookings = vec![booking(
            d(2024, 1, 1),
            d(2024, 1, 6),
            vec![line("L1", "101", 0), line("L2", "102", 3)],
        )];
        let segments = build(d(2024, 1, 1), d(2024, 2, 1), None, &bookings);
        // 0 夜明细不出条
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].room_id, "102");
        // 修正量按位置取: 第二条明细即使是首个出条的, 末日仍 = start + nights - 2
        assert_eq!(segments[0].date_start, d(2024, 1, 1));
        assert_eq!(segments[0].date_end, d(2024, 1, 2));
    }

    #[test]
    fn test_room_filter_keeps_layout_offsets() {
        let bookings = vec![booking(
            d(2024, 1, 1),
            d(2024, 1, 6),
            vec![line("L1", "101", 2), line("L2", "102", 3)],
        )];
        // 过滤到 102, 偏移仍包含 101 的 2 夜
        let segments = build(d(2024, 1, 1), d(2024, 2, 1), Some("102"), &bookings);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].date_start, d(2024, 1, 3));
    }

    #[test]
    fn test_window_excludes_disjoint_segments() {
        let bookings = vec![booking(
            d(2024, 1, 1),
            d(2024, 1, 5),
            vec![line("L1", "101", 4)],
        )];
        let segments = build(d(2024, 2, 1), d(2024, 2, 10), None, &bookings);
        assert!(segments.is_empty());
    }
}
