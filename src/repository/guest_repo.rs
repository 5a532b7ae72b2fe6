// ==========================================
// 酒店预订占用引擎 - 入住人仓储
// ==========================================

use crate::domain::reservation::GuestOccupant;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// GuestRepository - 入住人仓储
// ==========================================
pub struct GuestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GuestRepository {
    /// 创建新的 GuestRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 添加入住人
    pub fn add(&self, guest: &GuestOccupant) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO guest_occupant (guest_id, line_id, name, age, is_adult)
               VALUES (?, ?, ?, ?, ?)"#,
            params![
                &guest.guest_id,
                &guest.line_id,
                &guest.name,
                guest.age,
                guest.is_adult
            ],
        )?;
        Ok(guest.guest_id.clone())
    }

    /// 查询某条房间明细的入住人
    pub fn list_for_line(&self, line_id: &str) -> RepositoryResult<Vec<GuestOccupant>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT guest_id, line_id, name, age, is_adult
             FROM guest_occupant WHERE line_id = ? ORDER BY guest_id",
        )?;
        let guests = stmt
            .query_map(params![line_id], |row| {
                Ok(GuestOccupant {
                    guest_id: row.get(0)?,
                    line_id: row.get(1)?,
                    name: row.get(2)?,
                    age: row.get(3)?,
                    is_adult: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<GuestOccupant>, _>>()?;
        Ok(guests)
    }
}
