// ==========================================
// 酒店预订占用引擎 - 预订 API
// ==========================================
// 职责: 预订生命周期操作的编排入口 (建单/明细/流转/换房/甘特/审计)
// 红线: 规则在引擎层, 这里只做输入校验 + 委托 + 错误收敛
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::TransitionLog;
use crate::domain::reservation::{
    GuestOccupant, Reservation, ReservationLine, ReservationWithLines,
};
use crate::domain::side_records::{SaleDocument, ServiceLine};
use crate::domain::types::ReservationStatus;
use crate::engine::availability;
use crate::engine::gantt::{self, GanttSegment};
use crate::engine::room_change::{RoomChangeOperator, RoomChangeOutcome, RoomChangeRequest};
use crate::engine::state_machine::{ReservationStateMachine, TransitionOutcome};
use crate::engine::ReservationEventPublisher;
use crate::repository::action_log_repo::TransitionLogRepository;
use crate::repository::guest_repo::GuestRepository;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::room_repo::RoomRepository;
use crate::repository::side_record_repo::SideRecordRepository;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// 建单请求
// ==========================================
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationRequest {
    pub guest_name: String,
    pub hotel_id: String,
    pub check_in: NaiveDateTime,
    pub check_out: Option<NaiveDateTime>,
    pub currency: String,
    pub pricelist: Option<String>,
    pub company: Option<String>,
    pub agent: Option<String>,
    pub commission_pct: f64,
}

// ==========================================
// ReservationApi - 预订操作入口
// ==========================================
pub struct ReservationApi {
    reservation_repo: Arc<ReservationRepository>,
    room_repo: Arc<RoomRepository>,
    guest_repo: Arc<GuestRepository>,
    side_record_repo: Arc<SideRecordRepository>,
    log_repo: Arc<TransitionLogRepository>,
    state_machine: ReservationStateMachine,
    room_change: RoomChangeOperator,
}

impl ReservationApi {
    /// 从共享连接组装 API (仓储/引擎共享同一连接)
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        event_publisher: Option<Arc<dyn ReservationEventPublisher>>,
    ) -> Self {
        let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
        let room_repo = Arc::new(RoomRepository::new(conn.clone()));
        let guest_repo = Arc::new(GuestRepository::new(conn.clone()));
        let side_record_repo = Arc::new(SideRecordRepository::new(conn.clone()));
        let log_repo = Arc::new(TransitionLogRepository::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));

        let state_machine = ReservationStateMachine::new(
            reservation_repo.clone(),
            config.clone(),
            event_publisher.clone(),
        );
        let room_change = RoomChangeOperator::new(
            reservation_repo.clone(),
            room_repo.clone(),
            guest_repo.clone(),
            side_record_repo.clone(),
            config,
            event_publisher,
        );

        Self {
            reservation_repo,
            room_repo,
            guest_repo,
            side_record_repo,
            log_repo,
            state_machine,
            room_change,
        }
    }

    // ==========================================
    // 建单与明细
    // ==========================================

    /// 创建预订 (initial 状态入库)
    pub fn create_reservation(
        &self,
        request: &CreateReservationRequest,
        now: NaiveDateTime,
    ) -> ApiResult<Reservation> {
        if let Some(check_out) = request.check_out {
            if check_out <= request.check_in {
                return Err(ApiError::invalid_input(format!(
                    "退房时间 {} 必须晚于入住时间 {}",
                    check_out, request.check_in
                )));
            }
        }
        if request.guest_name.trim().is_empty() {
            return Err(ApiError::invalid_input("主客姓名不能为空"));
        }

        let reservation = Reservation {
            reservation_id: Uuid::new_v4().to_string(),
            guest_name: request.guest_name.clone(),
            hotel_id: request.hotel_id.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            status: ReservationStatus::Initial,
            total_amount: 0.0,
            currency: request.currency.clone(),
            pricelist: request.pricelist.clone(),
            company: request.company.clone(),
            agent: request.agent.clone(),
            commission_pct: request.commission_pct,
            linked_reservation_id: None,
            is_change_origin: false,
            is_change_destination: false,
            split_from_reservation_id: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        self.reservation_repo.create(&reservation)?;
        tracing::info!(
            "预订已创建: reservation_id={}, guest={}, [{} ~ {:?})",
            reservation.reservation_id,
            reservation.guest_name,
            reservation.check_in,
            reservation.check_out
        );
        Ok(reservation)
    }

    /// 为预订添加房间明细 (夜数按预订日期派生)
    ///
    /// 建单路径即检查可用性, 避免把冲突留到 confirm 时才暴露
    pub fn add_line(
        &self,
        reservation_id: &str,
        room_id: &str,
        price_override: Option<f64>,
        discount_pct: f64,
        now: NaiveDateTime,
    ) -> ApiResult<ReservationLine> {
        let reservation = self
            .reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::not_found(format!("预订未找到: {}", reservation_id)))?;
        let room = self
            .room_repo
            .find_by_id(room_id)?
            .ok_or_else(|| ApiError::not_found(format!("房间未找到: {}", room_id)))?;

        let check_out = reservation.check_out_date().ok_or_else(|| {
            ApiError::invalid_input("预订缺少退房时间, 无法派生夜数".to_string())
        })?;
        let check_in = reservation.check_in_date();

        let bookings = self.reservation_repo.list_occupying_overlapping(
            check_in,
            check_out,
            Some(reservation_id),
        )?;
        if !availability::room_is_available(room_id, check_in, check_out, None, &bookings) {
            return Err(ApiError::new(
                crate::api::error::ApiErrorKind::RoomUnavailable,
                format!(
                    "房间 {} 在 [{}, {}) 已被占用",
                    room_id, check_in, check_out
                ),
            ));
        }

        let line = ReservationLine {
            line_id: Uuid::new_v4().to_string(),
            reservation_id: reservation_id.to_string(),
            room_id: room.room_id.clone(),
            price: price_override.unwrap_or(room.list_price),
            original_price: room.list_price,
            discount_pct,
            nights: reservation.derived_nights(),
            created_at: now,
        };
        self.reservation_repo.create_line(&line)?;
        Ok(line)
    }

    /// 为房间明细添加入住人
    pub fn add_guest(&self, guest: &GuestOccupant) -> ApiResult<String> {
        Ok(self.guest_repo.add(guest)?)
    }

    /// 添加服务消费行
    pub fn add_service(&self, service: &ServiceLine) -> ApiResult<String> {
        Ok(self.side_record_repo.add_service(service)?)
    }

    /// 添加销售单据引用
    pub fn add_document(&self, document: &SaleDocument) -> ApiResult<String> {
        Ok(self.side_record_repo.add_document(document)?)
    }

    // ==========================================
    // 生命周期流转
    // ==========================================

    /// 请求状态流转 (守卫校验 + 乐观锁写入 + 审计 + 配置级联)
    pub fn request_transition(
        &self,
        reservation_id: &str,
        target: ReservationStatus,
        actor: &str,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> ApiResult<TransitionOutcome> {
        Ok(self
            .state_machine
            .request_transition(reservation_id, target, actor, today, now)?)
    }

    /// 住中换房 (拆分 + 移动附属记录, 单事务)
    pub fn change_room(
        &self,
        request: &RoomChangeRequest,
        now: NaiveDateTime,
    ) -> ApiResult<RoomChangeOutcome> {
        Ok(self.room_change.execute(request, now)?)
    }

    /// 复用已翻房的历史预订: 以其房间/价格为模板建一笔新 confirmed 预订
    pub fn reuse_room_ready(
        &self,
        reservation_id: &str,
        new_check_in: NaiveDateTime,
        new_check_out: NaiveDateTime,
        actor: &str,
        now: NaiveDateTime,
    ) -> ApiResult<Reservation> {
        let source = self
            .reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::not_found(format!("预订未找到: {}", reservation_id)))?;
        if source.status != ReservationStatus::RoomReady {
            return Err(ApiError::business_rule(format!(
                "只有 room_ready 状态的预订可以复用 (当前: {})",
                source.status
            )));
        }
        if new_check_out <= new_check_in {
            return Err(ApiError::invalid_input(format!(
                "退房时间 {} 必须晚于入住时间 {}",
                new_check_out, new_check_in
            )));
        }
        let source_lines = self.reservation_repo.lines_for_reservation(reservation_id)?;
        if source_lines.is_empty() {
            return Err(ApiError::business_rule("源预订没有房间明细, 无法复用"));
        }

        let start = new_check_in.date();
        let end = new_check_out.date();
        let nights = (end - start).num_days();
        let bookings = self
            .reservation_repo
            .list_occupying_overlapping(start, end, None)?;
        for line in &source_lines {
            if !availability::room_is_available(&line.room_id, start, end, None, &bookings) {
                return Err(ApiError::new(
                    crate::api::error::ApiErrorKind::RoomUnavailable,
                    format!("房间 {} 在 [{}, {}) 已被占用", line.room_id, start, end),
                ));
            }
        }

        let mut total = 0.0;
        let mut new_lines = Vec::with_capacity(source_lines.len());
        for line in &source_lines {
            let new_line = ReservationLine {
                line_id: Uuid::new_v4().to_string(),
                reservation_id: String::new(), // 建单后填充
                room_id: line.room_id.clone(),
                price: line.price,
                original_price: line.original_price,
                discount_pct: line.discount_pct,
                nights,
                created_at: now,
            };
            total += new_line.subtotal();
            new_lines.push(new_line);
        }

        let reservation = Reservation {
            reservation_id: Uuid::new_v4().to_string(),
            guest_name: source.guest_name.clone(),
            hotel_id: source.hotel_id.clone(),
            check_in: new_check_in,
            check_out: Some(new_check_out),
            status: ReservationStatus::Confirmed,
            total_amount: total,
            currency: source.currency.clone(),
            pricelist: source.pricelist.clone(),
            company: source.company.clone(),
            agent: source.agent.clone(),
            commission_pct: source.commission_pct,
            linked_reservation_id: None,
            is_change_origin: false,
            is_change_destination: false,
            split_from_reservation_id: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        self.reservation_repo.create(&reservation)?;
        for mut line in new_lines {
            line.reservation_id = reservation.reservation_id.clone();
            self.reservation_repo.create_line(&line)?;
        }
        self.log_repo.insert(&TransitionLog {
            log_id: Uuid::new_v4().to_string(),
            reservation_id: reservation.reservation_id.clone(),
            actor: actor.to_string(),
            old_status: ReservationStatus::Initial,
            new_status: ReservationStatus::Confirmed,
            detail: Some(format!("复用历史预订 {} 建单", reservation_id)),
            logged_at: now,
        })?;
        Ok(reservation)
    }

    /// 删除预订 (仅 cancelled 可删, 级联删除明细/入住人/附属记录)
    pub fn delete_reservation(&self, reservation_id: &str) -> ApiResult<()> {
        let reservation = self
            .reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::not_found(format!("预订未找到: {}", reservation_id)))?;
        if reservation.status != ReservationStatus::Cancelled {
            return Err(ApiError::business_rule(format!(
                "只有 cancelled 状态的预订可以删除 (当前: {})",
                reservation.status
            )));
        }
        self.reservation_repo.delete(reservation_id)?;
        tracing::info!("预订已删除: reservation_id={}", reservation_id);
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询预订详情
    pub fn get_reservation(&self, reservation_id: &str) -> ApiResult<Reservation> {
        self.reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::not_found(format!("预订未找到: {}", reservation_id)))
    }

    /// 查询窗口内的预订列表 (含明细)
    pub fn get_reservations(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
        hotel_id: Option<&str>,
    ) -> ApiResult<Vec<ReservationWithLines>> {
        if window_start >= window_end {
            return Err(ApiError::invalid_input(format!(
                "窗口起点 {} 必须早于终点 {}",
                window_start, window_end
            )));
        }
        Ok(self
            .reservation_repo
            .list_for_window(window_start, window_end, hotel_id)?)
    }

    /// 占用甘特图时间条
    pub fn gantt_segments(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
        room_filter: Option<&str>,
        hotel_id: Option<&str>,
    ) -> ApiResult<Vec<GanttSegment>> {
        let bookings = self.get_reservations(window_start, window_end, hotel_id)?;
        Ok(gantt::build(
            window_start,
            window_end,
            room_filter,
            &bookings,
        ))
    }

    /// 查询预订的流转审计历史
    pub fn transition_history(&self, reservation_id: &str) -> ApiResult<Vec<TransitionLog>> {
        Ok(self.log_repo.list_for_reservation(reservation_id)?)
    }

    /// 查询预订的服务消费行
    pub fn get_services(&self, reservation_id: &str) -> ApiResult<Vec<ServiceLine>> {
        Ok(self.side_record_repo.list_services(reservation_id)?)
    }

    /// 查询预订的销售单据
    pub fn get_documents(&self, reservation_id: &str) -> ApiResult<Vec<SaleDocument>> {
        Ok(self.side_record_repo.list_documents(reservation_id)?)
    }

    /// 查询房间明细的入住人
    pub fn get_guests(&self, line_id: &str) -> ApiResult<Vec<GuestOccupant>> {
        Ok(self.guest_repo.list_for_line(line_id)?)
    }
}
