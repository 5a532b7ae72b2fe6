// ==========================================
// 酒店预订占用引擎 - 换房引擎
// ==========================================
// 职责: 住中换房的校验/计算/批次构造,落库委托仓储单事务完成
// 语义: 拆分而非改写 —— 源预订缩短到换房日,目标房间生成新预订,
//       两单双向链接; 源预订夜数为 0 时整单取消
// 红线: 换房日当晚记入目标预订; 源预订保留原退房日期产生的
//       空档晚不回填计费(拆分按日粒度切齐)
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::reservation::{GuestOccupant, Reservation, ReservationLine};
use crate::domain::room::Room;
use crate::domain::types::ReservationStatus;
use crate::engine::availability;
use crate::engine::events::{
    OptionalEventPublisher, ReservationEvent, ReservationEventPublisher, ReservationEventType,
};
use crate::repository::error::RepositoryError;
use crate::repository::guest_repo::GuestRepository;
use crate::repository::reservation_repo::{ReservationRepository, RoomChangeWrite};
use crate::repository::room_repo::RoomRepository;
use crate::repository::side_record_repo::SideRecordRepository;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// 换房错误
// ==========================================
#[derive(Error, Debug)]
pub enum RoomChangeError {
    #[error("预订未找到: {0}")]
    NotFound(String),

    #[error("房间明细未找到: {0}")]
    LineNotFound(String),

    #[error("房间未找到: {0}")]
    RoomNotFound(String),

    #[error("换房日期区间非法: {0}")]
    InvalidDateRange(String),

    #[error("目标房间与当前房间相同: {room_id}")]
    SameRoomSelected { room_id: String },

    #[error("目标房间不可用: room_id={room_id}, 区间=[{start}, {end})")]
    RoomUnavailable {
        room_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("业务规则违反: {0}")]
    BusinessRule(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// RoomChangeRequest - 换房请求
// ==========================================
#[derive(Debug, Clone, Deserialize)]
pub struct RoomChangeRequest {
    /// 源房间明细 (所属预订必须处于 checkin)
    pub reservation_line_id: String,
    /// 目标房间
    pub new_room_id: String,
    /// 换房开始日 (含, 当晚记入目标预订)
    pub change_start: NaiveDate,
    /// 目标预订退房日 (不含)
    pub change_end: NaiveDate,
    /// 每晚价格覆盖 (缺省取目标房间牌价)
    pub price_override: Option<f64>,
    /// 操作人
    pub actor: String,
}

// ==========================================
// RoomChangeOutcome - 换房结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct RoomChangeOutcome {
    pub origin_id: String,
    pub destination_id: String,
    pub destination_line_id: String,
    /// 源预订夜数为 0, 已整单取消
    pub origin_cancelled: bool,
    /// 非致命警告 (容量超限/事件发布失败)
    pub warnings: Vec<String>,
}

// ==========================================
// RoomChangeOperator - 换房引擎
// ==========================================
pub struct RoomChangeOperator {
    reservation_repo: Arc<ReservationRepository>,
    room_repo: Arc<RoomRepository>,
    guest_repo: Arc<GuestRepository>,
    side_record_repo: Arc<SideRecordRepository>,
    config: Arc<ConfigManager>,
    event_publisher: OptionalEventPublisher,
}

impl RoomChangeOperator {
    /// 创建换房引擎
    pub fn new(
        reservation_repo: Arc<ReservationRepository>,
        room_repo: Arc<RoomRepository>,
        guest_repo: Arc<GuestRepository>,
        side_record_repo: Arc<SideRecordRepository>,
        config: Arc<ConfigManager>,
        event_publisher: Option<Arc<dyn ReservationEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        Self {
            reservation_repo,
            room_repo,
            guest_repo,
            side_record_repo,
            config,
            event_publisher,
        }
    }

    /// 执行换房
    ///
    /// 校验全部通过后构造写入批次,仓储在单事务内落库并做事务内重验;
    /// 任何校验或落库失败都不改变源预订
    pub fn execute(
        &self,
        request: &RoomChangeRequest,
        now: NaiveDateTime,
    ) -> Result<RoomChangeOutcome, RoomChangeError> {
        // ===== 由明细定位源预订 =====
        let origin_line = self
            .reservation_repo
            .find_line(&request.reservation_line_id)?
            .ok_or_else(|| RoomChangeError::LineNotFound(request.reservation_line_id.clone()))?;
        let origin = self
            .reservation_repo
            .find_by_id(&origin_line.reservation_id)?
            .ok_or_else(|| RoomChangeError::NotFound(origin_line.reservation_id.clone()))?;

        if origin.status != ReservationStatus::Checkin {
            return Err(RoomChangeError::BusinessRule(format!(
                "只有 checkin 状态的预订可以换房 (当前: {})",
                origin.status
            )));
        }

        let origin_check_out = origin.check_out.ok_or_else(|| {
            RoomChangeError::InvalidDateRange("源预订缺少退房时间,无法换房".to_string())
        })?;

        // 退房时间的缩短作用于整笔预订, 多明细预订不支持按条换房
        let lines = self
            .reservation_repo
            .lines_for_reservation(&origin.reservation_id)?;
        if lines.len() > 1 {
            return Err(RoomChangeError::BusinessRule(format!(
                "预订 {} 含 {} 条房间明细, 换房仅支持单明细预订",
                origin.reservation_id,
                lines.len()
            )));
        }

        // ===== 日期校验 =====
        if request.change_start >= request.change_end {
            return Err(RoomChangeError::InvalidDateRange(format!(
                "change_start {} 必须早于 change_end {}",
                request.change_start, request.change_end
            )));
        }
        let origin_start = origin.check_in_date();
        let origin_end = origin_check_out.date();
        if request.change_start < origin_start || request.change_start >= origin_end {
            return Err(RoomChangeError::InvalidDateRange(format!(
                "换房日 {} 必须落在住宿区间 [{}, {}) 内",
                request.change_start, origin_start, origin_end
            )));
        }

        // ===== 房间校验 =====
        if request.new_room_id == origin_line.room_id {
            return Err(RoomChangeError::SameRoomSelected {
                room_id: request.new_room_id.clone(),
            });
        }
        let new_room = self
            .room_repo
            .find_by_id(&request.new_room_id)?
            .ok_or_else(|| RoomChangeError::RoomNotFound(request.new_room_id.clone()))?;

        // ===== 可用性 (快照读, 事务内还会重验一次) =====
        let bookings = self.reservation_repo.list_occupying_overlapping(
            request.change_start,
            request.change_end,
            Some(&origin.reservation_id),
        )?;
        if !availability::room_is_available(
            &request.new_room_id,
            request.change_start,
            request.change_end,
            None,
            &bookings,
        ) {
            return Err(RoomChangeError::RoomUnavailable {
                room_id: request.new_room_id.clone(),
                start: request.change_start,
                end: request.change_end,
            });
        }

        // ===== 拆分计算 =====
        // 源预订保留 [check_in, change_start); 目标预订覆盖 [change_start, change_end)
        let origin_nights = (request.change_start - origin_start).num_days();
        let cancel_origin = origin_nights == 0;
        let change_nights = (request.change_end - request.change_start).num_days().max(1);

        // 拆分按日粒度切齐, 时点沿用源预订的入住/退房时刻
        let origin_new_check_out = if cancel_origin {
            None
        } else {
            Some(request.change_start.and_time(origin_check_out.time()))
        };
        let destination_check_in = request.change_start.and_time(origin.check_in.time());
        let destination_check_out = request.change_end.and_time(origin_check_out.time());

        // 定价: 覆盖价优先, 折扣沿用源明细
        let price = request.price_override.unwrap_or(new_room.list_price);
        let destination_line = ReservationLine {
            line_id: Uuid::new_v4().to_string(),
            reservation_id: String::new(), // 下方填充
            room_id: new_room.room_id.clone(),
            price,
            original_price: new_room.list_price,
            discount_pct: origin_line.discount_pct,
            nights: change_nights,
            created_at: now,
        };

        let destination = Reservation {
            reservation_id: Uuid::new_v4().to_string(),
            guest_name: origin.guest_name.clone(),
            hotel_id: origin.hotel_id.clone(),
            check_in: destination_check_in,
            check_out: Some(destination_check_out),
            status: ReservationStatus::Confirmed,
            total_amount: destination_line.subtotal(),
            currency: origin.currency.clone(),
            pricelist: origin.pricelist.clone(),
            company: origin.company.clone(),
            agent: origin.agent.clone(),
            commission_pct: origin.commission_pct,
            linked_reservation_id: Some(origin.reservation_id.clone()),
            is_change_origin: false,
            is_change_destination: true,
            split_from_reservation_id: Some(origin.reservation_id.clone()),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        let mut destination_line = destination_line;
        destination_line.reservation_id = destination.reservation_id.clone();

        // ===== 入住人复制 (新ID, 挂到目标明细) =====
        let origin_guests = self.guest_repo.list_for_line(&origin_line.line_id)?;
        let guest_copies: Vec<GuestOccupant> = origin_guests
            .iter()
            .map(|g| GuestOccupant {
                guest_id: Uuid::new_v4().to_string(),
                line_id: destination_line.line_id.clone(),
                name: g.name.clone(),
                age: g.age,
                is_adult: g.is_adult,
            })
            .collect();

        let mut warnings = Vec::new();
        Self::check_capacity(&new_room, &guest_copies, &mut warnings);

        // ===== 服务行(未开票)与销售单据移动 =====
        let move_service_ids: Vec<String> = self
            .side_record_repo
            .list_services(&origin.reservation_id)?
            .into_iter()
            .filter(|s| !s.invoiced)
            .map(|s| s.service_id)
            .collect();
        let move_document_ids: Vec<String> = self
            .side_record_repo
            .list_documents(&origin.reservation_id)?
            .into_iter()
            .map(|d| d.document_id)
            .collect();

        // ===== 原子落库 =====
        let write = RoomChangeWrite {
            origin_id: origin.reservation_id.clone(),
            origin_expected_revision: origin.revision,
            cancel_origin,
            origin_new_check_out,
            origin_line_id: origin_line.line_id.clone(),
            origin_line_nights: origin_nights,
            destination: destination.clone(),
            destination_line: destination_line.clone(),
            guest_copies,
            move_service_ids,
            move_document_ids,
            recheck_room_id: new_room.room_id.clone(),
            recheck_start: request.change_start,
            recheck_end: request.change_end,
            actor: request.actor.clone(),
            now,
        };
        self.reservation_repo.apply_room_change(&write)?;

        tracing::info!(
            "换房完成: origin={}, destination={}, room {} -> {}, [{}, {}), 源预订{}",
            origin.reservation_id,
            destination.reservation_id,
            origin_line.room_id,
            new_room.room_id,
            request.change_start,
            request.change_end,
            if cancel_origin { "已取消" } else { "已缩短" }
        );

        // ===== 提交后事件 =====
        self.event_publisher.publish_as_warning(
            ReservationEvent::room_changed(
                origin.reservation_id.clone(),
                destination.reservation_id.clone(),
                Some("RoomChangeOperator".to_string()),
            ),
            &mut warnings,
        );
        if self
            .config
            .get_bool(config_keys::NOTIFY_ON_ROOM_CHANGE, true)
        {
            self.event_publisher.publish_as_warning(
                ReservationEvent::outbound(
                    destination.reservation_id.clone(),
                    ReservationEventType::NotificationRequested,
                    Some("RoomChangeOperator".to_string()),
                ),
                &mut warnings,
            );
        }

        Ok(RoomChangeOutcome {
            origin_id: origin.reservation_id,
            destination_id: destination.reservation_id,
            destination_line_id: destination_line.line_id,
            origin_cancelled: cancel_origin,
            warnings,
        })
    }

    /// 入住人数超过目标房间容量时给出警告 (不阻断换房)
    fn check_capacity(room: &Room, guests: &[GuestOccupant], warnings: &mut Vec<String>) {
        let adults = guests.iter().filter(|g| g.is_adult).count() as i32;
        let children = guests.len() as i32 - adults;
        if adults > room.max_adult || children > room.max_child {
            let warning = format!(
                "入住人数超过房间 {} 容量: 成人 {}/{}, 儿童 {}/{}",
                room.name, adults, room.max_adult, children, room.max_child
            );
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(max_adult: i32, max_child: i32) -> Room {
        Room {
            room_id: "102".to_string(),
            name: "豪华大床房".to_string(),
            hotel_id: "H1".to_string(),
            list_price: 200.0,
            max_adult,
            max_child,
        }
    }

    fn guest(is_adult: bool) -> GuestOccupant {
        GuestOccupant {
            guest_id: Uuid::new_v4().to_string(),
            line_id: "L1".to_string(),
            name: "客人".to_string(),
            age: None,
            is_adult,
        }
    }

    #[test]
    fn test_capacity_warning_on_too_many_adults() {
        let mut warnings = Vec::new();
        RoomChangeOperator::check_capacity(
            &room(2, 1),
            &[guest(true), guest(true), guest(true)],
            &mut warnings,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("成人 3/2"));
    }

    #[test]
    fn test_capacity_ok_within_limits() {
        let mut warnings = Vec::new();
        RoomChangeOperator::check_capacity(
            &room(2, 1),
            &[guest(true), guest(true), guest(false)],
            &mut warnings,
        );
        assert!(warnings.is_empty());
    }
}
