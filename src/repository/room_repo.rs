// ==========================================
// 酒店预订占用引擎 - 客房目录仓储
// ==========================================
// 客房是外部协作方数据,引擎侧只读 + 目录同步写入
// ==========================================

use crate::domain::room::Room;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// RoomRepository - 客房仓储
// ==========================================
pub struct RoomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoomRepository {
    /// 创建新的 RoomRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/同步一间客房 (来自外部目录)
    pub fn upsert(&self, room: &Room) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO room (room_id, name, hotel_id, list_price, max_adult, max_child)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(room_id) DO UPDATE SET
                   name = excluded.name,
                   hotel_id = excluded.hotel_id,
                   list_price = excluded.list_price,
                   max_adult = excluded.max_adult,
                   max_child = excluded.max_child"#,
            params![
                &room.room_id,
                &room.name,
                &room.hotel_id,
                room.list_price,
                room.max_adult,
                room.max_child
            ],
        )?;
        Ok(())
    }

    /// 按房间ID查询
    pub fn find_by_id(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            "SELECT room_id, name, hotel_id, list_price, max_adult, max_child
             FROM room WHERE room_id = ?",
            params![room_id],
            Self::map_row,
        ) {
            Ok(room) => Ok(Some(room)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询客房列表 (可按酒店过滤, 按名称排序)
    pub fn list(&self, hotel_id: Option<&str>) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;
        let mut sql = String::from(
            "SELECT room_id, name, hotel_id, list_price, max_adult, max_child FROM room",
        );
        if hotel_id.is_some() {
            sql.push_str(" WHERE hotel_id = ?");
        }
        sql.push_str(" ORDER BY name");

        let mut stmt = conn.prepare(&sql)?;
        let rooms = match hotel_id {
            Some(h) => stmt
                .query_map(params![h], Self::map_row)?
                .collect::<Result<Vec<Room>, _>>()?,
            None => stmt
                .query_map([], Self::map_row)?
                .collect::<Result<Vec<Room>, _>>()?,
        };
        Ok(rooms)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Room> {
        Ok(Room {
            room_id: row.get(0)?,
            name: row.get(1)?,
            hotel_id: row.get(2)?,
            list_price: row.get(3)?,
            max_adult: row.get(4)?,
            max_child: row.get(5)?,
        })
    }
}
