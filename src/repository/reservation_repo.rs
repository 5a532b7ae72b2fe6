// ==========================================
// 酒店预订占用引擎 - 预订数据仓储
// ==========================================
// 职责: reservation / reservation_line / transition_log 的数据访问
// 红线: Repository 不含业务逻辑; 换房写入由引擎构造 RoomChangeWrite,
//       仓储只负责在单事务内原子落库
// 并发: 预订行携带 revision 乐观锁,写路径必须带 expected_revision
// ==========================================

use crate::domain::reservation::{
    GuestOccupant, Reservation, ReservationLine, ReservationWithLines,
};
use crate::domain::types::ReservationStatus;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::repository::error::{RepositoryError, RepositoryResult};

/// 数据库时间戳格式 (与 schema 对齐)
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
/// 数据库日期格式
pub(crate) const DATE_FMT: &str = "%Y-%m-%d";

/// 格式化时间戳为存储字符串
pub(crate) fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

/// 从存储字符串解析时间戳
pub(crate) fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 从存储字符串解析状态枚举
pub(crate) fn parse_status(idx: usize, s: &str) -> rusqlite::Result<ReservationStatus> {
    ReservationStatus::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

// ==========================================
// RoomChangeWrite - 换房写入批次
// ==========================================
// 由 RoomChangeOperator 在校验通过后构造,描述一次换房的全部落库动作。
// 仓储在单事务内执行: 事务内重验可用性 → 缩短/取消源预订 → 建目标预订与明细
// → 双向链接 → 移动服务行/单据 → 复制入住人。任一步失败整体回滚。
#[derive(Debug, Clone)]
pub struct RoomChangeWrite {
    // ===== 源预订 =====
    pub origin_id: String,
    pub origin_expected_revision: i64,
    /// 源预订夜数为 0 时整单取消,而非缩短
    pub cancel_origin: bool,
    /// 缩短后的退房时间 (cancel_origin 时为 None)
    pub origin_new_check_out: Option<NaiveDateTime>,
    pub origin_line_id: String,
    pub origin_line_nights: i64,

    // ===== 目标预订 (已填好链接/血缘字段, status 为 confirmed) =====
    pub destination: Reservation,
    pub destination_line: ReservationLine,

    // ===== 附属记录 =====
    pub guest_copies: Vec<GuestOccupant>,
    pub move_service_ids: Vec<String>,
    pub move_document_ids: Vec<String>,

    // ===== 事务内重验参数 =====
    pub recheck_room_id: String,
    pub recheck_start: NaiveDate,
    pub recheck_end: NaiveDate,

    // ===== 审计 =====
    pub actor: String,
    pub now: NaiveDateTime,
}

// ==========================================
// ReservationRepository - 预订仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    /// 创建新的 ReservationRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 预订 CRUD
    // ==========================================

    /// 创建预订
    pub fn create(&self, reservation: &Reservation) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_reservation(&conn, reservation)?;
        Ok(reservation.reservation_id.clone())
    }

    fn insert_reservation(conn: &Connection, r: &Reservation) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO reservation (
                reservation_id, guest_name, hotel_id, check_in, check_out, status,
                total_amount, currency, pricelist, company, agent, commission_pct,
                linked_reservation_id, is_change_origin, is_change_destination,
                split_from_reservation_id, revision, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &r.reservation_id,
                &r.guest_name,
                &r.hotel_id,
                fmt_datetime(&r.check_in),
                r.check_out.as_ref().map(fmt_datetime),
                r.status.as_str(),
                r.total_amount,
                &r.currency,
                &r.pricelist,
                &r.company,
                &r.agent,
                r.commission_pct,
                &r.linked_reservation_id,
                r.is_change_origin,
                r.is_change_destination,
                &r.split_from_reservation_id,
                r.revision,
                fmt_datetime(&r.created_at),
                fmt_datetime(&r.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 按预订ID查询
    pub fn find_by_id(&self, reservation_id: &str) -> RepositoryResult<Option<Reservation>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            &format!("{} WHERE reservation_id = ?", Self::SELECT_RESERVATION),
            params![reservation_id],
            Self::map_reservation_row,
        ) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 物理删除预订 (级联删除明细/入住人/附属记录)
    ///
    /// 业务约束"仅 cancelled 可删除"由 API 层保证
    pub fn delete(&self, reservation_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM reservation WHERE reservation_id = ?",
            params![reservation_id],
        )?;
        Ok(rows)
    }

    /// 状态写入 (乐观锁 + 同事务审计日志)
    ///
    /// 转移合法性由状态机引擎校验; 这里只保证:
    /// - revision 匹配才写入 (并发序列化)
    /// - 状态与 transition_log 在同一事务落库
    pub fn update_status(
        &self,
        reservation_id: &str,
        expected_revision: i64,
        new_status: ReservationStatus,
        old_status: ReservationStatus,
        actor: &str,
        detail: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            r#"UPDATE reservation
               SET status = ?, revision = revision + 1, updated_at = ?
               WHERE reservation_id = ? AND revision = ?"#,
            params![
                new_status.as_str(),
                fmt_datetime(&now),
                reservation_id,
                expected_revision
            ],
        )?;

        if rows == 0 {
            return Err(Self::stale_or_missing(&tx, reservation_id, expected_revision));
        }

        Self::insert_transition_log(
            &tx,
            reservation_id,
            actor,
            old_status,
            new_status,
            detail,
            now,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 区分 NotFound 与乐观锁冲突
    fn stale_or_missing(
        conn: &Connection,
        reservation_id: &str,
        expected: i64,
    ) -> RepositoryError {
        match conn.query_row(
            "SELECT revision FROM reservation WHERE reservation_id = ?",
            params![reservation_id],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(actual) => RepositoryError::OptimisticLockFailure {
                reservation_id: reservation_id.to_string(),
                expected,
                actual,
            },
            Err(rusqlite::Error::QueryReturnedNoRows) => RepositoryError::NotFound {
                entity: "reservation".to_string(),
                id: reservation_id.to_string(),
            },
            Err(e) => e.into(),
        }
    }

    // ==========================================
    // 区间查询
    // ==========================================

    /// 占用冲突检查输入: 与 [start, end) 相交且仍占房的预订 (含明细)
    ///
    /// 排除 cancelled / no_show / room_ready (半开区间,日粒度)
    pub fn list_occupying_overlapping(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exclude_reservation_id: Option<&str>,
    ) -> RepositoryResult<Vec<ReservationWithLines>> {
        let conn = self.get_conn()?;
        let exclude = exclude_reservation_id.unwrap_or("");
        let mut stmt = conn.prepare(&format!(
            r#"{}
               WHERE status NOT IN ('cancelled', 'no_show', 'room_ready')
                 AND check_out IS NOT NULL
                 AND date(check_in) < ?
                 AND date(check_out) > ?
                 AND reservation_id != ?
               ORDER BY check_in"#,
            Self::SELECT_RESERVATION
        ))?;
        let reservations = stmt
            .query_map(
                params![
                    end.format(DATE_FMT).to_string(),
                    start.format(DATE_FMT).to_string(),
                    exclude
                ],
                Self::map_reservation_row,
            )?
            .collect::<Result<Vec<Reservation>, _>>()?;
        drop(stmt);

        self.attach_lines(&conn, reservations)
    }

    /// 甘特图/列表输入: 与可见窗口相交的预订 (含明细)
    ///
    /// 排除 cancelled 与 room_ready (已结束的历史记录不上板); no_show 保留展示
    pub fn list_for_window(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
        hotel_id: Option<&str>,
    ) -> RepositoryResult<Vec<ReservationWithLines>> {
        let conn = self.get_conn()?;
        let mut sql = format!(
            r#"{}
               WHERE status NOT IN ('cancelled', 'room_ready')
                 AND check_out IS NOT NULL
                 AND date(check_in) < ?
                 AND date(check_out) > ?"#,
            Self::SELECT_RESERVATION
        );
        if hotel_id.is_some() {
            sql.push_str(" AND hotel_id = ?");
        }
        sql.push_str(" ORDER BY check_in");

        let mut stmt = conn.prepare(&sql)?;
        let window_end_s = window_end.format(DATE_FMT).to_string();
        let window_start_s = window_start.format(DATE_FMT).to_string();
        let reservations = match hotel_id {
            Some(h) => stmt
                .query_map(
                    params![window_end_s, window_start_s, h],
                    Self::map_reservation_row,
                )?
                .collect::<Result<Vec<Reservation>, _>>()?,
            None => stmt
                .query_map(
                    params![window_end_s, window_start_s],
                    Self::map_reservation_row,
                )?
                .collect::<Result<Vec<Reservation>, _>>()?,
        };
        drop(stmt);

        self.attach_lines(&conn, reservations)
    }

    /// 房态面板输入: 窗口内除 cancelled / no_show 外的预订 (含明细)
    ///
    /// room_ready 保留, 面板据此把房间标为"可立即复用"
    pub fn list_for_room_panel(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
        hotel_id: Option<&str>,
    ) -> RepositoryResult<Vec<ReservationWithLines>> {
        let conn = self.get_conn()?;
        let mut sql = format!(
            r#"{}
               WHERE status NOT IN ('cancelled', 'no_show')
                 AND check_out IS NOT NULL
                 AND date(check_in) < ?
                 AND date(check_out) > ?"#,
            Self::SELECT_RESERVATION
        );
        if hotel_id.is_some() {
            sql.push_str(" AND hotel_id = ?");
        }
        sql.push_str(" ORDER BY check_in");

        let mut stmt = conn.prepare(&sql)?;
        let window_end_s = window_end.format(DATE_FMT).to_string();
        let window_start_s = window_start.format(DATE_FMT).to_string();
        let reservations = match hotel_id {
            Some(h) => stmt
                .query_map(
                    params![window_end_s, window_start_s, h],
                    Self::map_reservation_row,
                )?
                .collect::<Result<Vec<Reservation>, _>>()?,
            None => stmt
                .query_map(
                    params![window_end_s, window_start_s],
                    Self::map_reservation_row,
                )?
                .collect::<Result<Vec<Reservation>, _>>()?,
        };
        drop(stmt);

        self.attach_lines(&conn, reservations)
    }

    fn attach_lines(
        &self,
        conn: &Connection,
        reservations: Vec<Reservation>,
    ) -> RepositoryResult<Vec<ReservationWithLines>> {
        let mut result = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let lines = Self::query_lines(conn, &reservation.reservation_id)?;
            result.push(ReservationWithLines { reservation, lines });
        }
        Ok(result)
    }

    // ==========================================
    // 明细 CRUD
    // ==========================================

    /// 创建房间明细
    pub fn create_line(&self, line: &ReservationLine) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_line(&conn, line)?;
        Ok(line.line_id.clone())
    }

    fn insert_line(conn: &Connection, line: &ReservationLine) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO reservation_line (
                line_id, reservation_id, room_id, price, original_price,
                discount_pct, nights, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &line.line_id,
                &line.reservation_id,
                &line.room_id,
                line.price,
                line.original_price,
                line.discount_pct,
                line.nights,
                fmt_datetime(&line.created_at),
            ],
        )?;
        Ok(())
    }

    /// 按明细ID查询
    pub fn find_line(&self, line_id: &str) -> RepositoryResult<Option<ReservationLine>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            &format!("{} WHERE line_id = ?", Self::SELECT_LINE),
            params![line_id],
            Self::map_line_row,
        ) {
            Ok(line) => Ok(Some(line)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询预订的全部明细 (按创建顺序)
    pub fn lines_for_reservation(
        &self,
        reservation_id: &str,
    ) -> RepositoryResult<Vec<ReservationLine>> {
        let conn = self.get_conn()?;
        Self::query_lines(&conn, reservation_id)
    }

    fn query_lines(
        conn: &Connection,
        reservation_id: &str,
    ) -> RepositoryResult<Vec<ReservationLine>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE reservation_id = ? ORDER BY created_at, line_id",
            Self::SELECT_LINE
        ))?;
        let lines = stmt
            .query_map(params![reservation_id], Self::map_line_row)?
            .collect::<Result<Vec<ReservationLine>, _>>()?;
        Ok(lines)
    }

    // ==========================================
    // 换房原子落库
    // ==========================================

    /// 在单事务内执行一次换房写入批次
    ///
    /// 失败语义: 任一步出错整体回滚,调用方可见的状态与调用前完全一致。
    /// 事务内先重验目标房间可用性 (快照读可能已过期,见并发模型),
    /// 冲突返回 OccupancyConflict。
    pub fn apply_room_change(&self, write: &RoomChangeWrite) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 1. 事务内重验: 目标房间在 [change_start, change_end) 无其他占用
        let conflicts: i64 = tx.query_row(
            r#"SELECT COUNT(*)
               FROM reservation_line l
               JOIN reservation r ON r.reservation_id = l.reservation_id
               WHERE l.room_id = ?
                 AND l.nights > 0
                 AND r.reservation_id != ?
                 AND r.status NOT IN ('cancelled', 'no_show', 'room_ready')
                 AND r.check_out IS NOT NULL
                 AND date(r.check_in) < ?
                 AND date(r.check_out) > ?"#,
            params![
                &write.recheck_room_id,
                &write.origin_id,
                write.recheck_end.format(DATE_FMT).to_string(),
                write.recheck_start.format(DATE_FMT).to_string(),
            ],
            |row| row.get(0),
        )?;
        if conflicts > 0 {
            return Err(RepositoryError::OccupancyConflict {
                room_id: write.recheck_room_id.clone(),
                start: write.recheck_start.format(DATE_FMT).to_string(),
                end: write.recheck_end.format(DATE_FMT).to_string(),
            });
        }

        let now_s = fmt_datetime(&write.now);

        // 2. 源预订: 缩短退房时间或整单取消 (乐观锁)
        let rows = if write.cancel_origin {
            tx.execute(
                r#"UPDATE reservation
                   SET status = 'cancelled',
                       linked_reservation_id = ?,
                       is_change_origin = 1,
                       revision = revision + 1,
                       updated_at = ?
                   WHERE reservation_id = ? AND revision = ?"#,
                params![
                    &write.destination.reservation_id,
                    now_s,
                    &write.origin_id,
                    write.origin_expected_revision
                ],
            )?
        } else {
            let new_check_out = write
                .origin_new_check_out
                .as_ref()
                .map(fmt_datetime)
                .ok_or_else(|| {
                    RepositoryError::ValidationError(
                        "缩短源预订时必须提供新的退房时间".to_string(),
                    )
                })?;
            tx.execute(
                r#"UPDATE reservation
                   SET check_out = ?,
                       linked_reservation_id = ?,
                       is_change_origin = 1,
                       revision = revision + 1,
                       updated_at = ?
                   WHERE reservation_id = ? AND revision = ?"#,
                params![
                    new_check_out,
                    &write.destination.reservation_id,
                    now_s,
                    &write.origin_id,
                    write.origin_expected_revision
                ],
            )?
        };
        if rows == 0 {
            return Err(Self::stale_or_missing(
                &tx,
                &write.origin_id,
                write.origin_expected_revision,
            ));
        }

        if write.cancel_origin {
            Self::insert_transition_log(
                &tx,
                &write.origin_id,
                &write.actor,
                ReservationStatus::Checkin,
                ReservationStatus::Cancelled,
                Some("换房自首晚发生,源预订自动取消"),
                write.now,
            )?;
        }

        // 3. 源明细夜数改写为显式值
        tx.execute(
            "UPDATE reservation_line SET nights = ? WHERE line_id = ?",
            params![write.origin_line_nights, &write.origin_line_id],
        )?;

        // 4. 目标预订 (confirmed 入库, 随即推进到 checkin, 客人立即入住)
        Self::insert_reservation(&tx, &write.destination)?;
        Self::insert_line(&tx, &write.destination_line)?;

        tx.execute(
            r#"UPDATE reservation
               SET status = 'checkin', revision = revision + 1, updated_at = ?
               WHERE reservation_id = ?"#,
            params![now_s, &write.destination.reservation_id],
        )?;
        Self::insert_transition_log(
            &tx,
            &write.destination.reservation_id,
            &write.actor,
            ReservationStatus::Confirmed,
            ReservationStatus::Checkin,
            Some("换房目标预订,客人直接入住"),
            write.now,
        )?;

        // 5. 入住人复制 (明细级)
        for guest in &write.guest_copies {
            tx.execute(
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
        }

        // 6. 服务行/销售单据重指向 (移动,不复制)
        for service_id in &write.move_service_ids {
            tx.execute(
                "UPDATE service_line SET reservation_id = ? WHERE service_id = ?",
                params![&write.destination.reservation_id, service_id],
            )?;
        }
        for document_id in &write.move_document_ids {
            tx.execute(
                "UPDATE sale_document SET reservation_id = ? WHERE document_id = ?",
                params![&write.destination.reservation_id, document_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 审计日志写入 (事务内复用)
    // ==========================================

    fn insert_transition_log(
        conn: &Connection,
        reservation_id: &str,
        actor: &str,
        old_status: ReservationStatus,
        new_status: ReservationStatus,
        detail: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO transition_log (
                log_id, reservation_id, actor, old_status, new_status, detail, logged_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                Uuid::new_v4().to_string(),
                reservation_id,
                actor,
                old_status.as_str(),
                new_status.as_str(),
                detail,
                fmt_datetime(&now),
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 行映射
    // ==========================================

    const SELECT_RESERVATION: &'static str = r#"SELECT
        reservation_id, guest_name, hotel_id, check_in, check_out, status,
        total_amount, currency, pricelist, company, agent, commission_pct,
        linked_reservation_id, is_change_origin, is_change_destination,
        split_from_reservation_id, revision, created_at, updated_at
    FROM reservation"#;

    fn map_reservation_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
        let check_in: String = row.get(3)?;
        let check_out: Option<String> = row.get(4)?;
        let status: String = row.get(5)?;
        let created_at: String = row.get(17)?;
        let updated_at: String = row.get(18)?;
        Ok(Reservation {
            reservation_id: row.get(0)?,
            guest_name: row.get(1)?,
            hotel_id: row.get(2)?,
            check_in: parse_datetime(3, &check_in)?,
            check_out: match check_out {
                Some(s) => Some(parse_datetime(4, &s)?),
                None => None,
            },
            status: parse_status(5, &status)?,
            total_amount: row.get(6)?,
            currency: row.get(7)?,
            pricelist: row.get(8)?,
            company: row.get(9)?,
            agent: row.get(10)?,
            commission_pct: row.get(11)?,
            linked_reservation_id: row.get(12)?,
            is_change_origin: row.get(13)?,
            is_change_destination: row.get(14)?,
            split_from_reservation_id: row.get(15)?,
            revision: row.get(16)?,
            created_at: parse_datetime(17, &created_at)?,
            updated_at: parse_datetime(18, &updated_at)?,
        })
    }

    const SELECT_LINE: &'static str = r#"SELECT
        line_id, reservation_id, room_id, price, original_price,
        discount_pct, nights, created_at
    FROM reservation_line"#;

    fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<ReservationLine> {
        let created_at: String = row.get(7)?;
        Ok(ReservationLine {
            line_id: row.get(0)?,
            reservation_id: row.get(1)?,
            room_id: row.get(2)?,
            price: row.get(3)?,
            original_price: row.get(4)?,
            discount_pct: row.get(5)?,
            nights: row.get(6)?,
            created_at: parse_datetime(7, &created_at)?,
        })
    }
}
