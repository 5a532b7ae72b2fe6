// ==========================================
// 酒店预订占用引擎 - 预订状态机
// ==========================================
// 职责: 单笔预订生命周期的状态流转 (转移表 + 守卫条件 + 审计 + 事件)
// 转移表见 ReservationStatus::allowed_targets (固定查表)
// 守卫顺序: 转移合法性 → 房间明细要求 → 日期一致性
// 红线: 校验全部通过后才写库; 状态与审计日志同事务;
//       副作用事件在提交后发布,失败只降级为警告
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::types::ReservationStatus;
use crate::engine::events::{
    OptionalEventPublisher, ReservationEvent, ReservationEventPublisher, ReservationEventType,
};
use crate::repository::error::RepositoryError;
use crate::repository::reservation_repo::ReservationRepository;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// 状态机错误
// ==========================================
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("非法的状态转换: from={from} to={to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("目标状态 {target} 要求至少一条房间明细")]
    MissingRoomAssignment { target: ReservationStatus },

    #[error("日期不一致: {0}")]
    DateInconsistency(String),

    #[error("预订未找到: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// TransitionOutcome - 流转结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub reservation_id: String,
    pub old_status: ReservationStatus,
    pub new_status: ReservationStatus,
    /// 配置驱动的级联流转 (如 checkout → cleaning_needed)
    pub cascaded_to: Option<ReservationStatus>,
    /// 副作用钩子的非致命警告
    pub warnings: Vec<String>,
}

// ==========================================
// ReservationStateMachine - 状态机引擎
// ==========================================
pub struct ReservationStateMachine {
    reservation_repo: Arc<ReservationRepository>,
    config: Arc<ConfigManager>,
    event_publisher: OptionalEventPublisher,
}

impl ReservationStateMachine {
    /// 创建状态机引擎
    pub fn new(
        reservation_repo: Arc<ReservationRepository>,
        config: Arc<ConfigManager>,
        event_publisher: Option<Arc<dyn ReservationEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        Self {
            reservation_repo,
            config,
            event_publisher,
        }
    }

    /// 请求状态流转
    ///
    /// # 参数
    /// - `today`: 日期守卫的参照日 (显式传入,保证可测性)
    /// - `now`: 审计时间戳
    ///
    /// # 失败语义
    /// 任何守卫失败都发生在写库之前,预订与明细保持原样
    pub fn request_transition(
        &self,
        reservation_id: &str,
        target: ReservationStatus,
        actor: &str,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<TransitionOutcome, StateMachineError> {
        let reservation = self
            .reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| StateMachineError::NotFound(reservation_id.to_string()))?;
        let current = reservation.status;

        // 守卫 1: 转移表 (自转移不在任何允许列表中,同样拒绝)
        if !current.allowed_targets().contains(&target) {
            return Err(StateMachineError::InvalidTransition {
                from: current,
                to: target,
            });
        }

        // 守卫 2: 目标状态要求房间明细
        if target.meta().requires_room {
            let lines = self.reservation_repo.lines_for_reservation(reservation_id)?;
            if lines.is_empty() {
                return Err(StateMachineError::MissingRoomAssignment { target });
            }
        }

        // 守卫 3: 日期一致性
        if target == ReservationStatus::Checkin && today < reservation.check_in_date() {
            return Err(StateMachineError::DateInconsistency(format!(
                "不能在入住日期 {} 之前办理入住 (今天: {})",
                reservation.check_in_date(),
                today
            )));
        }
        if target == ReservationStatus::Checkout && reservation.check_out.is_none() {
            return Err(StateMachineError::DateInconsistency(
                "办理退房前必须先设置退房时间".to_string(),
            ));
        }

        // 写入: 状态 + 审计日志同事务, revision 乐观锁序列化并发
        self.reservation_repo.update_status(
            reservation_id,
            reservation.revision,
            target,
            current,
            actor,
            None,
            now,
        )?;

        tracing::info!(
            "状态流转成功: reservation_id={}, {} -> {}, actor={}",
            reservation_id,
            current,
            target,
            actor
        );

        let mut warnings = Vec::new();
        self.publish_post_commit_events(reservation_id, target, &mut warnings);

        // 配置驱动级联: 退房后自动进入"待清洁"
        let mut cascaded_to = None;
        if target == ReservationStatus::Checkout
            && self
                .config
                .get_bool(config_keys::AUTO_CLEANING_ON_CHECKOUT, true)
        {
            match self.reservation_repo.update_status(
                reservation_id,
                reservation.revision + 1,
                ReservationStatus::CleaningNeeded,
                ReservationStatus::Checkout,
                actor,
                Some("退房后自动进入待清洁"),
                now,
            ) {
                Ok(()) => {
                    cascaded_to = Some(ReservationStatus::CleaningNeeded);
                    self.publish_post_commit_events(
                        reservation_id,
                        ReservationStatus::CleaningNeeded,
                        &mut warnings,
                    );
                }
                Err(e) => {
                    // 级联失败不回滚已完成的退房
                    let warning = format!("自动级联到待清洁失败: {}", e);
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(TransitionOutcome {
            reservation_id: reservation_id.to_string(),
            old_status: current,
            new_status: target,
            cascaded_to,
            warnings,
        })
    }

    /// 提交后事件: 状态变更通知 + 按配置触发外部协作方请求
    fn publish_post_commit_events(
        &self,
        reservation_id: &str,
        new_status: ReservationStatus,
        warnings: &mut Vec<String>,
    ) {
        self.event_publisher.publish_as_warning(
            ReservationEvent::status_changed(
                reservation_id.to_string(),
                new_status,
                Some("ReservationStateMachine".to_string()),
            ),
            warnings,
        );

        if new_status == ReservationStatus::Checkout
            && self
                .config
                .get_bool(config_keys::AUTO_INVOICE_ON_CHECKOUT, false)
        {
            self.event_publisher.publish_as_warning(
                ReservationEvent::outbound(
                    reservation_id.to_string(),
                    ReservationEventType::InvoiceRequested,
                    Some("ReservationStateMachine".to_string()),
                ),
                warnings,
            );
        }

        if new_status == ReservationStatus::CleaningNeeded
            && self
                .config
                .get_bool(config_keys::HOUSEKEEPING_ON_CLEANING_NEEDED, true)
        {
            self.event_publisher.publish_as_warning(
                ReservationEvent::outbound(
                    reservation_id.to_string(),
                    ReservationEventType::HousekeepingRequested,
                    Some("ReservationStateMachine".to_string()),
                ),
                warnings,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_shape() {
        use ReservationStatus::*;
        assert_eq!(Initial.allowed_targets(), &[Confirmed, Cancelled]);
        assert_eq!(Confirmed.allowed_targets(), &[Checkin, Cancelled, NoShow]);
        assert_eq!(Checkin.allowed_targets(), &[Checkout, Cancelled]);
        assert_eq!(Checkout.allowed_targets(), &[CleaningNeeded]);
        assert_eq!(CleaningNeeded.allowed_targets(), &[RoomReady]);
        assert_eq!(RoomReady.allowed_targets(), &[Confirmed]);
        assert_eq!(Cancelled.allowed_targets(), &[Initial]);
        assert_eq!(NoShow.allowed_targets(), &[Initial]);
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ReservationStatus::ALL {
            assert!(
                !status.allowed_targets().contains(&status),
                "{} 不应允许自转移",
                status
            );
        }
    }

    #[test]
    fn test_every_state_is_reachable() {
        // 除 initial 外的所有状态必须出现在某个允许列表中
        for target in ReservationStatus::ALL {
            if target == ReservationStatus::Initial {
                // initial 由 cancelled / no_show 重置可达
                assert!(ReservationStatus::Cancelled.allowed_targets().contains(&target));
                continue;
            }
            let reachable = ReservationStatus::ALL
                .iter()
                .any(|from| from.allowed_targets().contains(&target));
            assert!(reachable, "{} 不可达", target);
        }
    }
}
