// ==========================================
// 酒店预订占用引擎 - 流转审计日志仓储
// ==========================================
// 状态写入路径的日志在 ReservationRepository 事务内落库;
// 这里提供独立写入(如换房通知)与审计查询
// ==========================================

use crate::domain::action_log::TransitionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reservation_repo::{fmt_datetime, parse_datetime, parse_status};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// TransitionLogRepository - 流转日志仓储
// ==========================================
pub struct TransitionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransitionLogRepository {
    /// 创建新的 TransitionLogRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一条流转日志
    pub fn insert(&self, log: &TransitionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO transition_log (
                log_id, reservation_id, actor, old_status, new_status, detail, logged_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.log_id,
                &log.reservation_id,
                &log.actor,
                log.old_status.as_str(),
                log.new_status.as_str(),
                &log.detail,
                fmt_datetime(&log.logged_at),
            ],
        )?;
        Ok(log.log_id.clone())
    }

    /// 查询某预订的流转历史 (按时间升序)
    pub fn list_for_reservation(
        &self,
        reservation_id: &str,
    ) -> RepositoryResult<Vec<TransitionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT log_id, reservation_id, actor, old_status, new_status, detail, logged_at
               FROM transition_log
               WHERE reservation_id = ?
               ORDER BY logged_at, rowid"#,
        )?;
        let logs = stmt
            .query_map(params![reservation_id], Self::map_row)?
            .collect::<Result<Vec<TransitionLog>, _>>()?;
        Ok(logs)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TransitionLog> {
        let old_status: String = row.get(3)?;
        let new_status: String = row.get(4)?;
        let logged_at: String = row.get(6)?;
        Ok(TransitionLog {
            log_id: row.get(0)?,
            reservation_id: row.get(1)?,
            actor: row.get(2)?,
            old_status: parse_status(3, &old_status)?,
            new_status: parse_status(4, &new_status)?,
            detail: row.get(5)?,
            logged_at: parse_datetime(6, &logged_at)?,
        })
    }
}
