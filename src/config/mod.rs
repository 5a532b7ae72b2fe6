// ==========================================
// 酒店预订占用引擎 - 配置层
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, ConfigManager};
