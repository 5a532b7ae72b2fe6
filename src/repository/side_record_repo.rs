// ==========================================
// 酒店预订占用引擎 - 账务附属记录仓储
// ==========================================
// service_line / sale_document 的读写;
// 换房时的批量重指向在 ReservationRepository 的换房事务内完成
// ==========================================

use crate::domain::side_records::{SaleDocument, ServiceLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reservation_repo::{fmt_datetime, parse_datetime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// SideRecordRepository - 附属记录仓储
// ==========================================
pub struct SideRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SideRecordRepository {
    /// 创建新的 SideRecordRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 服务行
    // ==========================================

    /// 添加服务消费行
    pub fn add_service(&self, service: &ServiceLine) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO service_line (service_id, reservation_id, name, amount, invoiced, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &service.service_id,
                &service.reservation_id,
                &service.name,
                service.amount,
                service.invoiced,
                fmt_datetime(&service.created_at),
            ],
        )?;
        Ok(service.service_id.clone())
    }

    /// 查询预订的服务行
    pub fn list_services(&self, reservation_id: &str) -> RepositoryResult<Vec<ServiceLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT service_id, reservation_id, name, amount, invoiced, created_at
             FROM service_line WHERE reservation_id = ? ORDER BY created_at, service_id",
        )?;
        let services = stmt
            .query_map(params![reservation_id], Self::map_service_row)?
            .collect::<Result<Vec<ServiceLine>, _>>()?;
        Ok(services)
    }

    fn map_service_row(row: &rusqlite::Row) -> rusqlite::Result<ServiceLine> {
        let created_at: String = row.get(5)?;
        Ok(ServiceLine {
            service_id: row.get(0)?,
            reservation_id: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            invoiced: row.get(4)?,
            created_at: parse_datetime(5, &created_at)?,
        })
    }

    // ==========================================
    // 销售单据引用
    // ==========================================

    /// 添加销售单据引用
    pub fn add_document(&self, document: &SaleDocument) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO sale_document (document_id, reservation_id, name, state, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
            params![
                &document.document_id,
                &document.reservation_id,
                &document.name,
                &document.state,
                fmt_datetime(&document.created_at),
            ],
        )?;
        Ok(document.document_id.clone())
    }

    /// 查询预订的销售单据
    pub fn list_documents(&self, reservation_id: &str) -> RepositoryResult<Vec<SaleDocument>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, reservation_id, name, state, created_at
             FROM sale_document WHERE reservation_id = ? ORDER BY created_at, document_id",
        )?;
        let documents = stmt
            .query_map(params![reservation_id], |row| {
                let created_at: String = row.get(4)?;
                Ok(SaleDocument {
                    document_id: row.get(0)?,
                    reservation_id: row.get(1)?,
                    name: row.get(2)?,
                    state: row.get(3)?,
                    created_at: parse_datetime(4, &created_at)?,
                })
            })?
            .collect::<Result<Vec<SaleDocument>, _>>()?;
        Ok(documents)
    }
}
