// ==========================================
// 酒店预订占用引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供 init_schema 建表入口（预订/房间/服务/审计等核心表）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 核心表:
/// - room: 客房目录（外部协作方快照，引擎只读）
/// - reservation / reservation_line: 预订聚合根与房间明细
/// - guest_occupant: 入住人记录（挂在明细上）
/// - service_line / sale_document: 可重指向的账务附属记录
/// - transition_log: 状态流转审计
/// - config_kv: 钩子触发配置
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS room (
            room_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            hotel_id TEXT NOT NULL,
            list_price REAL NOT NULL DEFAULT 0,
            max_adult INTEGER NOT NULL DEFAULT 1,
            max_child INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS reservation (
            reservation_id TEXT PRIMARY KEY,
            guest_name TEXT NOT NULL,
            hotel_id TEXT NOT NULL,
            check_in TEXT NOT NULL,
            check_out TEXT,
            status TEXT NOT NULL,
            total_amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'CNY',
            pricelist TEXT,
            company TEXT,
            agent TEXT,
            commission_pct REAL NOT NULL DEFAULT 0,
            linked_reservation_id TEXT,
            is_change_origin INTEGER NOT NULL DEFAULT 0,
            is_change_destination INTEGER NOT NULL DEFAULT 0,
            split_from_reservation_id TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reservation_window
            ON reservation (check_in, check_out);
        CREATE INDEX IF NOT EXISTS idx_reservation_status
            ON reservation (status);

        CREATE TABLE IF NOT EXISTS reservation_line (
            line_id TEXT PRIMARY KEY,
            reservation_id TEXT NOT NULL REFERENCES reservation(reservation_id) ON DELETE CASCADE,
            room_id TEXT NOT NULL REFERENCES room(room_id),
            price REAL NOT NULL DEFAULT 0,
            original_price REAL NOT NULL DEFAULT 0,
            discount_pct REAL NOT NULL DEFAULT 0,
            nights INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_line_reservation
            ON reservation_line (reservation_id);
        CREATE INDEX IF NOT EXISTS idx_line_room
            ON reservation_line (room_id);

        CREATE TABLE IF NOT EXISTS guest_occupant (
            guest_id TEXT PRIMARY KEY,
            line_id TEXT NOT NULL REFERENCES reservation_line(line_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            age INTEGER,
            is_adult INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS service_line (
            service_id TEXT PRIMARY KEY,
            reservation_id TEXT NOT NULL REFERENCES reservation(reservation_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            invoiced INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sale_document (
            document_id TEXT PRIMARY KEY,
            reservation_id TEXT NOT NULL REFERENCES reservation(reservation_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transition_log (
            log_id TEXT PRIMARY KEY,
            reservation_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            old_status TEXT NOT NULL,
            new_status TEXT NOT NULL,
            detail TEXT,
            logged_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transition_log_reservation
            ON transition_log (reservation_id, logged_at);

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
