// ==========================================
// 酒店预订占用引擎 - 客房 API
// ==========================================
// 职责: 房态面板与可用房查询的编排入口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::room::Room;
use crate::domain::types::RoomStatus;
use crate::engine::availability;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::room_repo::RoomRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};

// ==========================================
// RoomView - 房态视图
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub room: Room,
    /// 派生房态 (不落库, 每次按预订快照计算)
    pub computed_status: RoomStatus,
}

// ==========================================
// RoomApi - 客房操作入口
// ==========================================
pub struct RoomApi {
    room_repo: Arc<RoomRepository>,
    reservation_repo: Arc<ReservationRepository>,
}

impl RoomApi {
    /// 从共享连接组装 API
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            room_repo: Arc::new(RoomRepository::new(conn.clone())),
            reservation_repo: Arc::new(ReservationRepository::new(conn)),
        }
    }

    /// 同步一间客房 (来自外部目录)
    pub fn upsert_room(&self, room: &Room) -> ApiResult<()> {
        if room.room_id.trim().is_empty() {
            return Err(ApiError::invalid_input("room_id 不能为空"));
        }
        Ok(self.room_repo.upsert(room)?)
    }

    /// 房态面板: 客房列表 + 派生房态
    ///
    /// 派生范围覆盖 [today, today + lookahead_days), 未来预订映射为 reserved
    pub fn get_rooms(
        &self,
        today: NaiveDate,
        lookahead_days: u64,
        hotel_id: Option<&str>,
    ) -> ApiResult<Vec<RoomView>> {
        let rooms = self.room_repo.list(hotel_id)?;
        let horizon = today
            .checked_add_days(chrono::Days::new(lookahead_days.max(1)))
            .unwrap_or(today);
        let bookings = self
            .reservation_repo
            .list_for_room_panel(today, horizon, hotel_id)?;

        Ok(rooms
            .into_iter()
            .map(|room| {
                let computed_status =
                    availability::room_computed_status(&room.room_id, today, &bookings);
                RoomView {
                    room,
                    computed_status,
                }
            })
            .collect())
    }

    /// 查询 [start, end) 内可用的房间 (半开区间, 背靠背不算冲突)
    pub fn rooms_available(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exclude_reservation_id: Option<&str>,
        hotel_id: Option<&str>,
    ) -> ApiResult<Vec<Room>> {
        if start >= end {
            return Err(ApiError::invalid_input(format!(
                "查询起点 {} 必须早于终点 {}",
                start, end
            )));
        }
        let rooms = self.room_repo.list(hotel_id)?;
        let room_ids: Vec<String> = rooms.iter().map(|r| r.room_id.clone()).collect();
        let bookings = self.reservation_repo.list_occupying_overlapping(
            start,
            end,
            exclude_reservation_id,
        )?;
        let available =
            availability::rooms_available(&room_ids, start, end, exclude_reservation_id, &bookings);

        Ok(rooms
            .into_iter()
            .filter(|room| available.contains(&room.room_id))
            .collect())
    }
}
