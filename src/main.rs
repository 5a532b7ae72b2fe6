// ==========================================
// 酒店预订占用引擎 - 可执行入口
// ==========================================
// 打开(或创建)本地数据库, 初始化 schema, 输出当前占用概览。
// 引擎主体以库形式被集成方嵌入, 本入口用于本地检查与初始化。
// ==========================================

use anyhow::{Context, Result};
use chrono::{Days, Local};
use hotel_occupancy::api::{ReservationApi, RoomApi};
use hotel_occupancy::{db, logging, APP_NAME, VERSION};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 默认数据库路径: <data_dir>/hotel-occupancy-engine/occupancy.db
fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("无法确定系统数据目录")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("无法创建数据目录: {}", dir.display()))?;
    Ok(dir.join("occupancy.db"))
}

fn main() -> Result<()> {
    logging::init();
    tracing::info!("{} v{} 启动", APP_NAME, VERSION);

    let db_path = match std::env::args().nth(1) {
        Some(p) => PathBuf::from(p),
        None => default_db_path()?,
    };
    tracing::info!("数据库路径: {}", db_path.display());

    let conn = db::open_sqlite_connection(
        db_path
            .to_str()
            .context("数据库路径包含非法 UTF-8 字符")?,
    )
    .context("打开数据库失败")?;
    db::init_schema(&conn).context("初始化 schema 失败")?;

    match db::read_schema_version(&conn)? {
        Some(v) if v == db::CURRENT_SCHEMA_VERSION => {
            tracing::info!("schema_version = {}", v);
        }
        Some(v) => {
            tracing::warn!(
                "schema_version 不匹配: 数据库 {} / 代码 {}, 请确认迁移状态",
                v,
                db::CURRENT_SCHEMA_VERSION
            );
        }
        None => tracing::warn!("未找到 schema_version 表"),
    }

    let conn = Arc::new(Mutex::new(conn));
    let room_api = RoomApi::new(conn.clone());
    let reservation_api = ReservationApi::new(conn, None);

    // 占用概览: 今天起 30 天窗口
    let today = Local::now().date_naive();
    let horizon = today
        .checked_add_days(Days::new(30))
        .unwrap_or(today);

    let rooms = room_api.get_rooms(today, 30, None)?;
    let bookings = reservation_api.get_reservations(today, horizon, None)?;

    println!("客房数: {}", rooms.len());
    for view in &rooms {
        println!(
            "  [{}] {} - {:?}",
            view.room.room_id, view.room.name, view.computed_status
        );
    }
    println!("窗口 [{} ~ {}) 内预订数: {}", today, horizon, bookings.len());
    for booking in &bookings {
        let r = &booking.reservation;
        println!(
            "  [{}] {} {} [{} ~ {:?}] 明细 {} 条",
            r.reservation_id,
            r.guest_name,
            r.status,
            r.check_in,
            r.check_out,
            booking.lines.len()
        );
    }

    Ok(())
}
