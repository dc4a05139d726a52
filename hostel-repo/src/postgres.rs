//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use hostel_types::domain::{ApiKeyId, EventType, ReminderId};
use hostel_types::{
    ApiKey, Booking, BookingId, DomainEvent, Hostel, HostelId, HostelRepository, Payment,
    PaymentId, PaymentListQuery, PaymentSchedule, PaymentStatus, Refund, RefundId, Reminder,
    RepoError, ScheduleId, UnitOfWork, WebhookEndpoint, WebhookEndpointId, WebhookEvent,
    WebhookStatus,
};

use crate::types::{db_err, from_minor, parse, parse_currency, stale, to_minor, tx_err};

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> anyhow::Result<()> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    execute_migration(
        pool,
        include_str!("../migrations/postgres/0001_hostels_bookings_payments.sql"),
        "0001",
    )
    .await?;
    execute_migration(
        pool,
        include_str!("../migrations/postgres/0002_refunds_schedules_reminders.sql"),
        "0002",
    )
    .await?;
    execute_migration(
        pool,
        include_str!("../migrations/postgres/0003_api_keys_webhooks.sql"),
        "0003",
    )
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository implementation.
pub struct PostgresRepo {
    pool: PgPool,
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

const HOSTEL_COLUMNS: &str = "id, name, currency, created_at";

#[derive(FromRow)]
struct PgHostel {
    id: Uuid,
    name: String,
    currency: String,
    created_at: DateTime<Utc>,
}

impl PgHostel {
    fn into_domain(self) -> Result<Hostel, RepoError> {
        Ok(Hostel {
            id: HostelId::from_uuid(self.id),
            name: self.name,
            currency: parse_currency(&self.currency)?,
            created_at: self.created_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, hostel_id, student_id, room_type, check_in_date, \
    stay_duration_months, quoted_rent_monthly, security_deposit, advance_amount, total_amount, \
    currency, status, version, created_at, updated_at";

#[derive(FromRow)]
struct PgBooking {
    id: Uuid,
    hostel_id: Uuid,
    student_id: Uuid,
    room_type: Option<String>,
    check_in_date: NaiveDate,
    stay_duration_months: i32,
    quoted_rent_monthly: i64,
    security_deposit: i64,
    advance_amount: i64,
    total_amount: i64,
    currency: String,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgBooking {
    fn into_domain(self) -> Result<Booking, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Booking {
            id: BookingId::from_uuid(self.id),
            hostel_id: HostelId::from_uuid(self.hostel_id),
            student_id: self.student_id,
            room_type: self.room_type,
            check_in_date: self.check_in_date,
            stay_duration_months: u32::try_from(self.stay_duration_months)
                .map_err(|e| RepoError::Database(e.to_string()))?,
            quoted_rent_monthly: from_minor(self.quoted_rent_monthly, currency)?,
            security_deposit: from_minor(self.security_deposit, currency)?,
            advance_amount: from_minor(self.advance_amount, currency)?,
            total_amount: from_minor(self.total_amount, currency)?,
            currency,
            status: parse(&self.status, "bookings.status")?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, hostel_id, payer_id, student_id, booking_id, schedule_id, \
    payment_type, amount, currency, method, status, due_date, paid_at, failed_at, failure_reason, \
    gateway_order_id, gateway_payment_id, transaction_reference, receipt_number, description, \
    idempotency_key, refunded_amount, version, created_at, updated_at";

#[derive(FromRow)]
struct PgPayment {
    id: Uuid,
    hostel_id: Uuid,
    payer_id: Uuid,
    student_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    schedule_id: Option<Uuid>,
    payment_type: String,
    amount: i64,
    currency: String,
    method: String,
    status: String,
    due_date: Option<NaiveDate>,
    paid_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    transaction_reference: Option<String>,
    receipt_number: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
    refunded_amount: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgPayment {
    fn into_domain(self) -> Result<Payment, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            hostel_id: HostelId::from_uuid(self.hostel_id),
            payer_id: self.payer_id,
            student_id: self.student_id,
            booking_id: self.booking_id.map(BookingId::from_uuid),
            schedule_id: self.schedule_id.map(ScheduleId::from_uuid),
            payment_type: parse(&self.payment_type, "payments.payment_type")?,
            amount: from_minor(self.amount, currency)?,
            currency,
            method: parse(&self.method, "payments.method")?,
            status: parse(&self.status, "payments.status")?,
            due_date: self.due_date,
            paid_at: self.paid_at,
            failed_at: self.failed_at,
            failure_reason: self.failure_reason,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            transaction_reference: self.transaction_reference,
            receipt_number: self.receipt_number,
            description: self.description,
            idempotency_key: self.idempotency_key,
            refunded_amount: from_minor(self.refunded_amount, currency)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const REFUND_COLUMNS: &str = "id, payment_id, hostel_id, amount, currency, reason, status, \
    gateway_refund_id, rejection_reason, requested_at, processed_at, version";

#[derive(FromRow)]
struct PgRefund {
    id: Uuid,
    payment_id: Uuid,
    hostel_id: Uuid,
    amount: i64,
    currency: String,
    reason: String,
    status: String,
    gateway_refund_id: Option<String>,
    rejection_reason: Option<String>,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl PgRefund {
    fn into_domain(self) -> Result<Refund, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Refund {
            id: RefundId::from_uuid(self.id),
            payment_id: PaymentId::from_uuid(self.payment_id),
            hostel_id: HostelId::from_uuid(self.hostel_id),
            amount: from_minor(self.amount, currency)?,
            currency,
            reason: self.reason,
            status: parse(&self.status, "refunds.status")?,
            gateway_refund_id: self.gateway_refund_id,
            rejection_reason: self.rejection_reason,
            requested_at: self.requested_at,
            processed_at: self.processed_at,
            version: self.version,
        })
    }
}

const SCHEDULE_COLUMNS: &str = "id, hostel_id, payer_id, student_id, booking_id, payment_type, \
    amount, currency, method, frequency, start_date, end_date, next_due_date, \
    installments_generated, status, description, version, created_at, updated_at";

#[derive(FromRow)]
struct PgSchedule {
    id: Uuid,
    hostel_id: Uuid,
    payer_id: Uuid,
    student_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    payment_type: String,
    amount: i64,
    currency: String,
    method: String,
    frequency: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    next_due_date: NaiveDate,
    installments_generated: i32,
    status: String,
    description: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgSchedule {
    fn into_domain(self) -> Result<PaymentSchedule, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(PaymentSchedule {
            id: ScheduleId::from_uuid(self.id),
            hostel_id: HostelId::from_uuid(self.hostel_id),
            payer_id: self.payer_id,
            student_id: self.student_id,
            booking_id: self.booking_id.map(BookingId::from_uuid),
            payment_type: parse(&self.payment_type, "payment_schedules.payment_type")?,
            amount: from_minor(self.amount, currency)?,
            currency,
            method: parse(&self.method, "payment_schedules.method")?,
            frequency: parse(&self.frequency, "payment_schedules.frequency")?,
            start_date: self.start_date,
            end_date: self.end_date,
            next_due_date: self.next_due_date,
            installments_generated: u32::try_from(self.installments_generated)
                .map_err(|e| RepoError::Database(e.to_string()))?,
            status: parse(&self.status, "payment_schedules.status")?,
            description: self.description,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const REMINDER_COLUMNS: &str = "id, payment_id, hostel_id, kind, reminder_date, created_at";

#[derive(FromRow)]
struct PgReminder {
    id: Uuid,
    payment_id: Uuid,
    hostel_id: Uuid,
    kind: String,
    reminder_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl PgReminder {
    fn into_domain(self) -> Result<Reminder, RepoError> {
        Ok(Reminder {
            id: ReminderId::from_uuid(self.id),
            payment_id: PaymentId::from_uuid(self.payment_id),
            hostel_id: HostelId::from_uuid(self.hostel_id),
            kind: parse(&self.kind, "payment_reminders.kind")?,
            reminder_date: self.reminder_date,
            created_at: self.created_at,
        })
    }
}

const API_KEY_COLUMNS: &str = "id, name, key_hash, hostel_id, is_active, created_at, last_used_at";

#[derive(FromRow)]
struct PgApiKey {
    id: Uuid,
    name: String,
    key_hash: String,
    hostel_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<PgApiKey> for ApiKey {
    fn from(row: PgApiKey) -> Self {
        ApiKey {
            id: ApiKeyId::from_uuid(row.id),
            name: row.name,
            key_hash: row.key_hash,
            hostel_id: row.hostel_id.map(HostelId::from_uuid),
            is_active: row.is_active,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

const ENDPOINT_COLUMNS: &str = "id, url, secret, events, is_active, created_at";

#[derive(FromRow)]
struct PgWebhookEndpoint {
    id: Uuid,
    url: String,
    secret: String,
    events: Json<Vec<EventType>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<PgWebhookEndpoint> for WebhookEndpoint {
    fn from(row: PgWebhookEndpoint) -> Self {
        WebhookEndpoint {
            id: WebhookEndpointId::from_uuid(row.id),
            url: row.url,
            secret: row.secret,
            events: row.events.0,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct PgPendingWebhook {
    id: Uuid,
    endpoint_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    attempts: i32,
    last_error: Option<String>,
    url: String,
    secret: String,
    endpoint_events: Json<Vec<EventType>>,
    endpoint_active: bool,
    endpoint_created_at: DateTime<Utc>,
}

impl PgPendingWebhook {
    fn into_domain(self) -> Result<(WebhookEvent, WebhookEndpoint), RepoError> {
        let endpoint = WebhookEndpoint::from(PgWebhookEndpoint {
            id: self.endpoint_id,
            url: self.url,
            secret: self.secret,
            events: self.endpoint_events,
            is_active: self.endpoint_active,
            created_at: self.endpoint_created_at,
        });
        let event = WebhookEvent {
            id: self.id,
            endpoint_id: endpoint.id,
            event_type: parse(&self.event_type, "webhook_events.event_type")?,
            payload: self.payload,
            status: parse(&self.status, "webhook_events.status")?,
            created_at: self.created_at,
            processed_at: self.processed_at,
            attempts: self.attempts,
            last_error: self.last_error,
        };
        Ok((event, endpoint))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work writes
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_booking(conn: &mut PgConnection, b: &Booking) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO bookings (id, hostel_id, student_id, room_type, check_in_date,
               stay_duration_months, quoted_rent_monthly, security_deposit, advance_amount,
               total_amount, currency, status, version, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
    )
    .bind(b.id.into_uuid())
    .bind(b.hostel_id.into_uuid())
    .bind(b.student_id)
    .bind(&b.room_type)
    .bind(b.check_in_date)
    .bind(i32::try_from(b.stay_duration_months).map_err(|e| RepoError::Database(e.to_string()))?)
    .bind(to_minor(b.quoted_rent_monthly, b.currency)?)
    .bind(to_minor(b.security_deposit, b.currency)?)
    .bind(to_minor(b.advance_amount, b.currency)?)
    .bind(to_minor(b.total_amount, b.currency)?)
    .bind(b.currency.code())
    .bind(b.status.as_str())
    .bind(b.version)
    .bind(b.created_at)
    .bind(b.updated_at)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_booking(conn: &mut PgConnection, b: &Booking) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE bookings SET status = $1, version = version + 1, updated_at = $2
           WHERE id = $3 AND version = $4"#,
    )
    .bind(b.status.as_str())
    .bind(b.updated_at)
    .bind(b.id.into_uuid())
    .bind(b.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("booking", b.id));
    }
    Ok(())
}

async fn insert_payment(conn: &mut PgConnection, p: &Payment) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payments (id, hostel_id, payer_id, student_id, booking_id, schedule_id,
               payment_type, amount, currency, method, status, due_date, paid_at, failed_at,
               failure_reason, gateway_order_id, gateway_payment_id, transaction_reference,
               receipt_number, description, idempotency_key, refunded_amount, version,
               created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                   $18, $19, $20, $21, $22, $23, $24, $25)"#,
    )
    .bind(p.id.into_uuid())
    .bind(p.hostel_id.into_uuid())
    .bind(p.payer_id)
    .bind(p.student_id)
    .bind(p.booking_id.map(BookingId::into_uuid))
    .bind(p.schedule_id.map(ScheduleId::into_uuid))
    .bind(p.payment_type.as_str())
    .bind(to_minor(p.amount, p.currency)?)
    .bind(p.currency.code())
    .bind(p.method.as_str())
    .bind(p.status.as_str())
    .bind(p.due_date)
    .bind(p.paid_at)
    .bind(p.failed_at)
    .bind(&p.failure_reason)
    .bind(&p.gateway_order_id)
    .bind(&p.gateway_payment_id)
    .bind(&p.transaction_reference)
    .bind(&p.receipt_number)
    .bind(&p.description)
    .bind(&p.idempotency_key)
    .bind(to_minor(p.refunded_amount, p.currency)?)
    .bind(p.version)
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_payment(conn: &mut PgConnection, p: &Payment) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE payments SET method = $1, status = $2, paid_at = $3, failed_at = $4,
               failure_reason = $5, gateway_order_id = $6, gateway_payment_id = $7,
               transaction_reference = $8, receipt_number = $9, refunded_amount = $10,
               version = version + 1, updated_at = $11
           WHERE id = $12 AND version = $13"#,
    )
    .bind(p.method.as_str())
    .bind(p.status.as_str())
    .bind(p.paid_at)
    .bind(p.failed_at)
    .bind(&p.failure_reason)
    .bind(&p.gateway_order_id)
    .bind(&p.gateway_payment_id)
    .bind(&p.transaction_reference)
    .bind(&p.receipt_number)
    .bind(to_minor(p.refunded_amount, p.currency)?)
    .bind(p.updated_at)
    .bind(p.id.into_uuid())
    .bind(p.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("payment", p.id));
    }
    Ok(())
}

async fn insert_refund(conn: &mut PgConnection, r: &Refund) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO refunds (id, payment_id, hostel_id, amount, currency, reason, status,
               gateway_refund_id, rejection_reason, requested_at, processed_at, version)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
    )
    .bind(r.id.into_uuid())
    .bind(r.payment_id.into_uuid())
    .bind(r.hostel_id.into_uuid())
    .bind(to_minor(r.amount, r.currency)?)
    .bind(r.currency.code())
    .bind(&r.reason)
    .bind(r.status.as_str())
    .bind(&r.gateway_refund_id)
    .bind(&r.rejection_reason)
    .bind(r.requested_at)
    .bind(r.processed_at)
    .bind(r.version)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_refund(conn: &mut PgConnection, r: &Refund) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE refunds SET status = $1, gateway_refund_id = $2, rejection_reason = $3,
               processed_at = $4, version = version + 1
           WHERE id = $5 AND version = $6"#,
    )
    .bind(r.status.as_str())
    .bind(&r.gateway_refund_id)
    .bind(&r.rejection_reason)
    .bind(r.processed_at)
    .bind(r.id.into_uuid())
    .bind(r.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("refund", r.id));
    }
    Ok(())
}

async fn insert_schedule(conn: &mut PgConnection, s: &PaymentSchedule) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_schedules (id, hostel_id, payer_id, student_id, booking_id,
               payment_type, amount, currency, method, frequency, start_date, end_date,
               next_due_date, installments_generated, status, description, version, created_at,
               updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                   $19)"#,
    )
    .bind(s.id.into_uuid())
    .bind(s.hostel_id.into_uuid())
    .bind(s.payer_id)
    .bind(s.student_id)
    .bind(s.booking_id.map(BookingId::into_uuid))
    .bind(s.payment_type.as_str())
    .bind(to_minor(s.amount, s.currency)?)
    .bind(s.currency.code())
    .bind(s.method.as_str())
    .bind(s.frequency.as_str())
    .bind(s.start_date)
    .bind(s.end_date)
    .bind(s.next_due_date)
    .bind(installments(s)?)
    .bind(s.status.as_str())
    .bind(&s.description)
    .bind(s.version)
    .bind(s.created_at)
    .bind(s.updated_at)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_schedule(conn: &mut PgConnection, s: &PaymentSchedule) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE payment_schedules SET next_due_date = $1, installments_generated = $2,
               status = $3, version = version + 1, updated_at = $4
           WHERE id = $5 AND version = $6"#,
    )
    .bind(s.next_due_date)
    .bind(installments(s)?)
    .bind(s.status.as_str())
    .bind(s.updated_at)
    .bind(s.id.into_uuid())
    .bind(s.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("schedule", s.id));
    }
    Ok(())
}

fn installments(s: &PaymentSchedule) -> Result<i32, RepoError> {
    i32::try_from(s.installments_generated).map_err(|e| RepoError::Database(e.to_string()))
}

async fn insert_reminder(conn: &mut PgConnection, r: &Reminder) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_reminders (id, payment_id, hostel_id, kind, reminder_date, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(r.id.into_uuid())
    .bind(r.payment_id.into_uuid())
    .bind(r.hostel_id.into_uuid())
    .bind(r.kind.as_str())
    .bind(r.reminder_date)
    .bind(r.created_at)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn enqueue_events(conn: &mut PgConnection, events: &[DomainEvent]) -> Result<usize, RepoError> {
    if events.is_empty() {
        return Ok(0);
    }

    let rows: Vec<PgWebhookEndpoint> = sqlx::query_as(&format!(
        "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE is_active = TRUE"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    let endpoints: Vec<WebhookEndpoint> = rows.into_iter().map(Into::into).collect();

    let mut queued = 0;
    for event in events {
        for row in event.fan_out(&endpoints) {
            sqlx::query(
                r#"INSERT INTO webhook_events (id, endpoint_id, event_type, payload, status, created_at, attempts)
                   VALUES ($1, $2, $3, $4, $5, $6, 0)"#,
            )
            .bind(row.id)
            .bind(row.endpoint_id.into_uuid())
            .bind(row.event_type.as_str())
            .bind(&row.payload)
            .bind(row.status.as_str())
            .bind(row.created_at)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
            queued += 1;
        }
    }
    Ok(queued)
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl HostelRepository for PostgresRepo {
    async fn create_hostel(&self, hostel: &Hostel) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO hostels (id, name, currency, created_at) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(hostel.id.into_uuid())
        .bind(&hostel.name)
        .bind(hostel.currency.code())
        .bind(hostel.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_hostel(&self, id: HostelId) -> Result<Option<Hostel>, RepoError> {
        let row: Option<PgHostel> =
            sqlx::query_as(&format!("SELECT {HOSTEL_COLUMNS} FROM hostels WHERE id = $1"))
                .bind(id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(PgHostel::into_domain).transpose()
    }

    async fn list_hostels(&self) -> Result<Vec<Hostel>, RepoError> {
        let rows: Vec<PgHostel> =
            sqlx::query_as(&format!("SELECT {HOSTEL_COLUMNS} FROM hostels ORDER BY name"))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter().map(PgHostel::into_domain).collect()
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
        let row: Option<PgBooking> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(PgBooking::into_domain).transpose()
    }

    async fn list_bookings(&self, hostel_id: HostelId) -> Result<Vec<Booking>, RepoError> {
        let rows: Vec<PgBooking> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE hostel_id = $1 ORDER BY created_at DESC"
        ))
        .bind(hostel_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PgBooking::into_domain).collect()
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let row: Option<PgPayment> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
                .bind(id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(PgPayment::into_domain).transpose()
    }

    async fn find_payment_by_idempotency_key(
        &self,
        hostel_id: HostelId,
        key: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<PgPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE hostel_id = $1 AND idempotency_key = $2"
        ))
        .bind(hostel_id.into_uuid())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PgPayment::into_domain).transpose()
    }

    async fn find_payment_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<PgPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PgPayment::into_domain).transpose()
    }

    async fn find_payment_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<PgPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_payment_id = $1 LIMIT 1"
        ))
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PgPayment::into_domain).transpose()
    }

    async fn list_payments(&self, query: &PaymentListQuery) -> Result<Vec<Payment>, RepoError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE TRUE"));
        if let Some(hostel_id) = query.hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.into_uuid());
        }
        if let Some(student_id) = query.student_id {
            qb.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(booking_id) = query.booking_id {
            qb.push(" AND booking_id = ").push_bind(booking_id.into_uuid());
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.due_from {
            qb.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = query.due_to {
            qb.push(" AND due_date <= ").push_bind(to);
        }
        qb.push(" ORDER BY due_date ASC NULLS LAST, created_at");

        let rows: Vec<PgPayment> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(PgPayment::into_domain).collect()
    }

    async fn list_open_payments(
        &self,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<Payment>, RepoError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE due_date IS NOT NULL AND status IN ("
        ));
        qb.push_bind(PaymentStatus::Pending.as_str())
            .push(", ")
            .push_bind(PaymentStatus::Processing.as_str())
            .push(")");
        if let Some(hostel_id) = hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.into_uuid());
        }
        qb.push(" ORDER BY due_date, created_at");

        let rows: Vec<PgPayment> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(PgPayment::into_domain).collect()
    }

    async fn get_refund(&self, id: RefundId) -> Result<Option<Refund>, RepoError> {
        let row: Option<PgRefund> =
            sqlx::query_as(&format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = $1"))
                .bind(id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(PgRefund::into_domain).transpose()
    }

    async fn find_refund_by_gateway_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<Refund>, RepoError> {
        let row: Option<PgRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE gateway_refund_id = $1"
        ))
        .bind(gateway_refund_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PgRefund::into_domain).transpose()
    }

    async fn list_refunds_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Refund>, RepoError> {
        let rows: Vec<PgRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE payment_id = $1 ORDER BY requested_at"
        ))
        .bind(payment_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PgRefund::into_domain).collect()
    }

    async fn list_refunds(&self, hostel_id: HostelId) -> Result<Vec<Refund>, RepoError> {
        let rows: Vec<PgRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE hostel_id = $1 ORDER BY requested_at"
        ))
        .bind(hostel_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PgRefund::into_domain).collect()
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<PaymentSchedule>, RepoError> {
        let row: Option<PgSchedule> = sqlx::query_as(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE id = $1"
        ))
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PgSchedule::into_domain).transpose()
    }

    async fn list_schedules(
        &self,
        hostel_id: HostelId,
    ) -> Result<Vec<PaymentSchedule>, RepoError> {
        let rows: Vec<PgSchedule> = sqlx::query_as(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE hostel_id = $1 ORDER BY created_at"
        ))
        .bind(hostel_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PgSchedule::into_domain).collect()
    }

    async fn list_due_schedules(
        &self,
        as_of: NaiveDate,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<PaymentSchedule>, RepoError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE status = 'active' AND next_due_date <= "
        ));
        qb.push_bind(as_of);
        if let Some(hostel_id) = hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.into_uuid());
        }
        qb.push(" ORDER BY next_due_date");

        let rows: Vec<PgSchedule> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(PgSchedule::into_domain).collect()
    }

    async fn list_reminders_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Reminder>, RepoError> {
        let rows: Vec<PgReminder> = sqlx::query_as(&format!(
            "SELECT {REMINDER_COLUMNS} FROM payment_reminders WHERE payment_id = $1 ORDER BY reminder_date, created_at"
        ))
        .bind(payment_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PgReminder::into_domain).collect()
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<(), RepoError> {
        if uow.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        for booking in &uow.new_bookings {
            insert_booking(&mut tx, booking).await?;
        }
        for booking in &uow.updated_bookings {
            update_booking(&mut tx, booking).await?;
        }
        for schedule in &uow.new_schedules {
            insert_schedule(&mut tx, schedule).await?;
        }
        for schedule in &uow.updated_schedules {
            update_schedule(&mut tx, schedule).await?;
        }
        for payment in &uow.new_payments {
            insert_payment(&mut tx, payment).await?;
        }
        for payment in &uow.updated_payments {
            update_payment(&mut tx, payment).await?;
        }
        for refund in &uow.new_refunds {
            insert_refund(&mut tx, refund).await?;
        }
        for refund in &uow.updated_refunds {
            update_refund(&mut tx, refund).await?;
        }
        for reminder in &uow.new_reminders {
            insert_reminder(&mut tx, reminder).await?;
        }
        let queued = enqueue_events(&mut tx, &uow.events).await?;

        tx.commit().await.map_err(tx_err)?;

        tracing::debug!(
            events = uow.events.len(),
            webhooks_queued = queued,
            "Unit of work committed"
        );
        Ok(())
    }

    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError> {
        let row: Option<PgApiKey> = sqlx::query_as(&format!(
            r#"UPDATE api_keys SET last_used_at = NOW()
               WHERE key_hash = $1 AND is_active = TRUE
               RETURNING {API_KEY_COLUMNS}"#
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(ApiKey::from))
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO api_keys (id, name, key_hash, hostel_id, is_active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(key.id.into_uuid())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.hostel_id.map(HostelId::into_uuid))
        .bind(key.is_active)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn count_api_keys(&self) -> Result<i64, RepoError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError> {
        let rows: Vec<PgApiKey> = sqlx::query_as(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE is_active = TRUE ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result =
            sqlx::query("UPDATE api_keys SET is_active = FALSE WHERE id = $1 AND is_active = TRUE")
                .bind(id.into_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_webhook_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO webhook_endpoints (id, url, secret, events, is_active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(endpoint.id.into_uuid())
        .bind(&endpoint.url)
        .bind(&endpoint.secret)
        .bind(Json(&endpoint.events))
        .bind(endpoint.is_active)
        .bind(endpoint.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_webhook_endpoints(&self) -> Result<Vec<WebhookEndpoint>, RepoError> {
        let rows: Vec<PgWebhookEndpoint> = sqlx::query_as(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE is_active = TRUE ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_pending_webhooks(
        &self,
        limit: i64,
    ) -> Result<Vec<(WebhookEvent, WebhookEndpoint)>, RepoError> {
        let rows: Vec<PgPendingWebhook> = sqlx::query_as(
            r#"
            SELECT e.id, e.endpoint_id, e.event_type, e.payload, e.status, e.created_at,
                   e.processed_at, e.attempts, e.last_error,
                   w.url, w.secret, w.events AS endpoint_events,
                   w.is_active AS endpoint_active, w.created_at AS endpoint_created_at
            FROM webhook_events e
            JOIN webhook_endpoints w ON w.id = e.endpoint_id
            WHERE e.status = 'pending'
            ORDER BY e.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(PgPendingWebhook::into_domain).collect()
    }

    async fn update_webhook_status(
        &self,
        id: Uuid,
        status: WebhookStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError> {
        let processed_at = matches!(status, WebhookStatus::Completed | WebhookStatus::Failed)
            .then(Utc::now);

        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $1, processed_at = $2, last_error = $3, attempts = attempts + 1
            WHERE id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(processed_at)
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
