// ==========================================
// 酒店预订占用引擎 - 可用性引擎
// ==========================================
// 职责: 半开区间占用冲突判定 / 可用房间集计算 / 房间计算状态
// 红线: 纯函数,对预订数据快照计算,不做任何写入
// 边界策略: [check_in, check_out) 半开区间 —— 退房日即入住日的
//           背靠背预订不算冲突,允许当日翻房
// ==========================================

use crate::domain::reservation::{Reservation, ReservationWithLines};
use crate::domain::types::RoomStatus;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// 两个半开日期区间是否相交
///
/// [a_start, a_end) 与 [b_start, b_end) 相交
/// 当且仅当 a_start < b_end 且 a_end > b_start
pub fn date_ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// 预订是否与候选区间 [candidate_start, candidate_end) 冲突
///
/// cancelled / no_show 不占房; room_ready 表示住宿已结束,
/// 房间对新预订开放,同样不参与冲突; 无退房时间的草稿不占房
pub fn overlaps(
    reservation: &Reservation,
    candidate_start: NaiveDate,
    candidate_end: NaiveDate,
) -> bool {
    if !reservation.status.occupies_room() {
        return false;
    }
    let check_out = match reservation.check_out_date() {
        Some(d) => d,
        None => return false,
    };
    date_ranges_overlap(
        reservation.check_in_date(),
        check_out,
        candidate_start,
        candidate_end,
    )
}

/// 计算候选房间集中在 [start, end) 内无占用的房间
///
/// # 参数
/// - `room_set`: 候选房间ID集合
/// - `bookings`: 预订快照 (含明细); 调用方负责提供覆盖区间的数据
/// - `exclude_reservation_id`: 换房场景下排除当前预订自身
///
/// # 返回
/// - 仍然可用的房间ID集合 (保持输入顺序去重)
///
/// nights == 0 的明细不贡献占用
pub fn rooms_available(
    room_set: &[String],
    start: NaiveDate,
    end: NaiveDate,
    exclude_reservation_id: Option<&str>,
    bookings: &[ReservationWithLines],
) -> Vec<String> {
    let mut occupied: BTreeSet<&str> = BTreeSet::new();

    for booking in bookings {
        if let Some(exclude) = exclude_reservation_id {
            if booking.reservation.reservation_id == exclude {
                continue;
            }
        }
        if !overlaps(&booking.reservation, start, end) {
            continue;
        }
        for line in &booking.lines {
            if line.occupies() {
                occupied.insert(line.room_id.as_str());
            }
        }
    }

    let mut seen = BTreeSet::new();
    room_set
        .iter()
        .filter(|room_id| !occupied.contains(room_id.as_str()) && seen.insert(room_id.as_str()))
        .cloned()
        .collect()
}

/// 某房间在候选区间内是否可用
pub fn room_is_available(
    room_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    exclude_reservation_id: Option<&str>,
    bookings: &[ReservationWithLines],
) -> bool {
    let set = [room_id.to_string()];
    !rooms_available(&set, start, end, exclude_reservation_id, bookings).is_empty()
}

/// 房间计算状态 (供房态面板/get_rooms 使用)
///
/// 判定顺序:
/// 1. 今天有活跃预订占用 → occupied
/// 2. 今天仅有 room_ready 记录覆盖 → available_reusable (可立即复用)
/// 3. 存在未来活跃预订 → reserved
/// 4. 其余 → available
///
/// 面板覆盖判定含退房日 (退房当天房态仍按在住显示, 翻房后转
/// available_reusable); 冲突判定仍是半开区间, 不受此影响
pub fn room_computed_status(
    room_id: &str,
    today: NaiveDate,
    bookings: &[ReservationWithLines],
) -> RoomStatus {
    let mut covers_today_active = false;
    let mut covers_today_room_ready = false;
    let mut has_future_active = false;

    for booking in bookings {
        let uses_room = booking
            .lines
            .iter()
            .any(|line| line.room_id == room_id && line.occupies());
        if !uses_room {
            continue;
        }
        let reservation = &booking.reservation;
        let check_out = match reservation.check_out_date() {
            Some(d) => d,
            None => continue,
        };

        let covers_today = reservation.check_in_date() <= today && check_out >= today;

        if reservation.status == crate::domain::types::ReservationStatus::RoomReady {
            if covers_today {
                covers_today_room_ready = true;
            }
            continue;
        }
        if !reservation.status.occupies_room() {
            continue;
        }
        if covers_today {
            covers_today_active = true;
        } else if reservation.check_in_date() > today {
            has_future_active = true;
        }
    }

    if covers_today_active {
        RoomStatus::Occupied
    } else if covers_today_room_ready {
        RoomStatus::AvailableReusable
    } else if has_future_active {
        RoomStatus::Reserved
    } else {
        RoomStatus::Available
    }
}
