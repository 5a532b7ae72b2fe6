// ==========================================
// 酒店预订占用引擎 - 引擎层事件发布
// ==========================================
// 职责: 定义预订事件发布 trait,实现依赖倒置
// 说明: 开票/客房清洁/通知等副作用由外部协作方消费事件实现,
//       引擎在核心事务提交后发布,外部失败不回滚核心状态
// ==========================================

use crate::domain::types::ReservationStatus;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 预订事件类型
// ==========================================

/// 预订事件触发类型
///
/// 引擎层定义的事件类型,用于通知下游系统
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEventType {
    /// 状态变更
    StatusChanged,
    /// 请求生成发票 (退房触发)
    InvoiceRequested,
    /// 请求创建清洁任务
    HousekeepingRequested,
    /// 请求发送通知/邮件
    NotificationRequested,
    /// 换房完成
    RoomChanged,
}

impl ReservationEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            ReservationEventType::StatusChanged => "StatusChanged",
            ReservationEventType::InvoiceRequested => "InvoiceRequested",
            ReservationEventType::HousekeepingRequested => "HousekeepingRequested",
            ReservationEventType::NotificationRequested => "NotificationRequested",
            ReservationEventType::RoomChanged => "RoomChanged",
        }
    }
}

/// 预订事件
///
/// 引擎层发布的事件,包含预订ID、触发类型与上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationEvent {
    /// 预订 ID
    pub reservation_id: String,
    /// 事件类型
    pub event_type: ReservationEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 新状态 (状态变更类事件)
    pub new_status: Option<ReservationStatus>,
    /// 换房对端预订 ID (RoomChanged 事件)
    pub counterpart_id: Option<String>,
}

impl ReservationEvent {
    /// 创建状态变更事件
    pub fn status_changed(
        reservation_id: String,
        new_status: ReservationStatus,
        source: Option<String>,
    ) -> Self {
        Self {
            reservation_id,
            event_type: ReservationEventType::StatusChanged,
            source,
            new_status: Some(new_status),
            counterpart_id: None,
        }
    }

    /// 创建外部协作方请求事件 (开票/清洁/通知)
    pub fn outbound(
        reservation_id: String,
        event_type: ReservationEventType,
        source: Option<String>,
    ) -> Self {
        Self {
            reservation_id,
            event_type,
            source,
            new_status: None,
            counterpart_id: None,
        }
    }

    /// 创建换房完成事件
    pub fn room_changed(
        origin_id: String,
        destination_id: String,
        source: Option<String>,
    ) -> Self {
        Self {
            reservation_id: origin_id,
            event_type: ReservationEventType::RoomChanged,
            source,
            new_status: None,
            counterpart_id: Some(destination_id),
        }
    }

    /// 序列化为 JSON 载荷 (消息队列/HTTP 回调的统一格式)
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("事件序列化失败: {}", e);
            format!(
                r#"{{"reservation_id":"{}","event_type":"{}"}}"#,
                self.reservation_id,
                self.event_type.as_str()
            )
        })
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 预订事件发布者 Trait
///
/// 引擎层定义,集成方实现(消息队列/HTTP 回调等)。
/// 通过 trait 实现依赖倒置,核心事务的原子性不与外部子系统可用性纠缠。
pub trait ReservationEventPublisher: Send + Sync {
    /// 发布预订事件
    ///
    /// # 返回
    /// - `Ok(task_id)`: 任务 ID(如果支持)或空字符串
    /// - `Err`: 发布失败 (调用方记录为警告,不回滚)
    fn publish(&self, event: ReservationEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景(如单元测试)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ReservationEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ReservationEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!("NoOpEventPublisher: 跳过事件发布 - {}", event.to_payload());
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn ReservationEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ReservationEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn ReservationEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例(不发布事件)
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件(如果有发布者)
    pub fn publish(&self, event: ReservationEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者,跳过事件 - reservation_id={}, event_type={}",
                    event.reservation_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 发布事件,失败降级为警告字符串 (副作用不得中断核心流程)
    pub fn publish_as_warning(&self, event: ReservationEvent, warnings: &mut Vec<String>) {
        let event_type = event.event_type.as_str().to_string();
        let reservation_id = event.reservation_id.clone();
        if let Err(e) = self.publish(event) {
            let warning = format!(
                "事件发布失败(不影响核心状态): event_type={}, reservation_id={}, error={}",
                event_type, reservation_id, e
            );
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
