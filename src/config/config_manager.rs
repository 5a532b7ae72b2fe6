// ==========================================
// 酒店预订占用引擎 - 配置管理
// ==========================================
// 职责: config_kv 表的读写,副作用钩子的触发开关
// 说明: 配置项缺失时返回内置默认值,不阻断核心流程
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键定义
// ==========================================
pub mod config_keys {
    /// 退房时自动级联到"待清洁" (默认 true)
    pub const AUTO_CLEANING_ON_CHECKOUT: &str = "auto_cleaning_on_checkout";
    /// 退房时自动请求开票 (默认 false, 对应外部开票系统的自动生成开关)
    pub const AUTO_INVOICE_ON_CHECKOUT: &str = "auto_invoice_on_checkout";
    /// 进入"待清洁"时自动请求创建清洁任务 (默认 true)
    pub const HOUSEKEEPING_ON_CLEANING_NEEDED: &str = "housekeeping_on_cleaning_needed";
    /// 换房完成后发送通知 (默认 true)
    pub const NOTIFY_ON_ROOM_CHANGE: &str = "notify_on_room_change";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从共享连接创建配置管理器
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取配置值 (不存在返回 None)
    pub fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取布尔配置 (缺失或非法值时返回默认值)
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Ok(Some(v)) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    tracing::warn!("配置项 {} 的值无法解析为布尔: {}, 使用默认值 {}", key, other, default);
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!("读取配置项 {} 失败: {}, 使用默认值 {}", key, e, default);
                default
            }
        }
    }

    /// 写入配置值 (upsert)
    pub fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO config_kv (key, value, updated_at)
               VALUES (?, ?, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        Ok(())
    }
}
