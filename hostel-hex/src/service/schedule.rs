//! Recurring payment schedules.

use std::sync::Arc;

use chrono::NaiveDate;

use hostel_types::domain::NewSchedule;
use hostel_types::{
    AppError, CreateScheduleRequest, EventType, GenerateDueResponse, HostelId, HostelRepository,
    Payment, PaymentSchedule, Principal, RepoError, ScheduleId, UnitOfWork,
};

use super::{ensure_booking_in_hostel, event, load_hostel, load_schedule};

pub struct PaymentScheduleService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> PaymentScheduleService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn create_schedule(
        &self,
        principal: &Principal,
        req: CreateScheduleRequest,
    ) -> Result<PaymentSchedule, AppError> {
        principal.ensure_hostel(req.hostel_id)?;
        let hostel = load_hostel(self.repo.as_ref(), req.hostel_id).await?;
        ensure_booking_in_hostel(self.repo.as_ref(), req.booking_id, hostel.id).await?;

        let schedule = PaymentSchedule::new(
            NewSchedule {
                hostel_id: hostel.id,
                payer_id: req.payer_id,
                student_id: req.student_id,
                booking_id: req.booking_id,
                payment_type: req.payment_type,
                amount: req.amount,
                method: req.method,
                frequency: req.frequency,
                start_date: req.start_date,
                end_date: req.end_date,
                description: req.description,
            },
            hostel.currency,
        )?;

        let mut uow = UnitOfWork::new();
        uow.insert_schedule(schedule.clone());
        self.repo.commit(uow).await?;

        tracing::info!(
            schedule_id = %schedule.id,
            frequency = %schedule.frequency,
            next_due = %schedule.next_due_date,
            "Payment schedule created"
        );
        Ok(schedule)
    }

    pub async fn get_schedule(
        &self,
        principal: &Principal,
        id: ScheduleId,
    ) -> Result<PaymentSchedule, AppError> {
        let schedule = load_schedule(self.repo.as_ref(), id).await?;
        principal.ensure_hostel(schedule.hostel_id)?;
        Ok(schedule)
    }

    pub async fn list_schedules(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
    ) -> Result<Vec<PaymentSchedule>, AppError> {
        principal.ensure_hostel(hostel_id)?;
        load_hostel(self.repo.as_ref(), hostel_id).await?;
        self.repo.list_schedules(hostel_id).await.map_err(Into::into)
    }

    pub async fn pause(&self, principal: &Principal, id: ScheduleId) -> Result<PaymentSchedule, AppError> {
        let mut schedule = self.get_schedule(principal, id).await?;
        schedule.pause()?;
        self.save(schedule).await
    }

    /// Resumes a paused schedule from `today`; dates missed while paused are skipped.
    pub async fn resume(
        &self,
        principal: &Principal,
        id: ScheduleId,
        today: NaiveDate,
    ) -> Result<PaymentSchedule, AppError> {
        let mut schedule = self.get_schedule(principal, id).await?;
        schedule.resume(today)?;
        self.save(schedule).await
    }

    pub async fn cancel(&self, principal: &Principal, id: ScheduleId) -> Result<PaymentSchedule, AppError> {
        let mut schedule = self.get_schedule(principal, id).await?;
        schedule.cancel()?;
        self.save(schedule).await
    }

    async fn save(&self, mut schedule: PaymentSchedule) -> Result<PaymentSchedule, AppError> {
        let mut uow = UnitOfWork::new();
        uow.update_schedule(schedule.clone());
        self.repo.commit(uow).await?;
        schedule.version += 1;
        tracing::info!(schedule_id = %schedule.id, status = %schedule.status, "Schedule updated");
        Ok(schedule)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates one pending payment per due date up to `as_of` for every
    /// active schedule, and advances the schedules.
    ///
    /// Each schedule commits on its own. A schedule advanced concurrently by
    /// another run is skipped, and installments are keyed so a date is never
    /// billed twice.
    pub async fn generate_due_payments(
        &self,
        as_of: NaiveDate,
        hostel_id: Option<HostelId>,
    ) -> Result<GenerateDueResponse, AppError> {
        let schedules = self.repo.list_due_schedules(as_of, hostel_id).await?;
        let mut processed = 0;
        let mut payments = Vec::new();

        for mut schedule in schedules {
            let dates = schedule.take_due_dates(as_of);
            let mut uow = UnitOfWork::new();
            let mut created = Vec::with_capacity(dates.len());

            for due_date in dates {
                let input = schedule.installment(due_date);
                if let Some(key) = input.idempotency_key.as_deref() {
                    if self
                        .repo
                        .find_payment_by_idempotency_key(schedule.hostel_id, key)
                        .await?
                        .is_some()
                    {
                        continue;
                    }
                }
                let payment = Payment::new(input, schedule.currency)?;
                uow.insert_payment(payment.clone())
                    .emit(event(EventType::PaymentCreated, &payment)?);
                created.push(payment);
            }
            uow.update_schedule(schedule.clone());

            match self.repo.commit(uow).await {
                Ok(()) => {
                    processed += 1;
                    tracing::info!(
                        schedule_id = %schedule.id,
                        created = created.len(),
                        next_due = %schedule.next_due_date,
                        status = %schedule.status,
                        "Schedule payments generated"
                    );
                    payments.extend(created);
                }
                Err(RepoError::Conflict(msg)) => {
                    tracing::warn!(schedule_id = %schedule.id, %msg, "Schedule changed during generation, skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(GenerateDueResponse {
            as_of,
            schedules_processed: processed,
            payments,
        })
    }
}
