//! SQLite repository adapter.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use hostel_types::domain::{ApiKeyId, EventType};
use hostel_types::{
    ApiKey, Booking, BookingId, DomainEvent, Hostel, HostelId, HostelRepository, Payment,
    PaymentId, PaymentListQuery, PaymentSchedule, PaymentStatus, Refund, RefundId, Reminder,
    RepoError, ScheduleId, UnitOfWork, WebhookEndpoint, WebhookEvent, WebhookStatus,
};

use crate::types::{
    date, date_opt, db_err, from_minor, parse, parse_currency, parse_date, parse_date_opt,
    parse_opt, parse_ts, parse_ts_opt, stale, to_minor, ts, ts_opt, tx_err,
};

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &SqlitePool, sql: &str, name: &str) -> anyhow::Result<()> {
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
async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    execute_migration(
        pool,
        include_str!("../migrations/sqlite/0001_hostels_bookings_payments.sql"),
        "0001",
    )
    .await?;
    execute_migration(
        pool,
        include_str!("../migrations/sqlite/0002_refunds_schedules_reminders.sql"),
        "0002",
    )
    .await?;
    execute_migration(
        pool,
        include_str!("../migrations/sqlite/0003_api_keys_webhooks.sql"),
        "0003",
    )
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if !in_memory {
            if let Some(path) = database_url
                .strip_prefix("sqlite://")
                .or_else(|| database_url.strip_prefix("sqlite:"))
            {
                let path = path.split('?').next().unwrap_or(path);
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

const HOSTEL_COLUMNS: &str = "id, name, currency, created_at";

#[derive(FromRow)]
struct DbHostel {
    id: String,
    name: String,
    currency: String,
    created_at: String,
}

impl DbHostel {
    fn into_domain(self) -> Result<Hostel, RepoError> {
        Ok(Hostel {
            id: parse(&self.id, "hostels.id")?,
            name: self.name,
            currency: parse_currency(&self.currency)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, hostel_id, student_id, room_type, check_in_date, \
    stay_duration_months, quoted_rent_monthly, security_deposit, advance_amount, total_amount, \
    currency, status, version, created_at, updated_at";

#[derive(FromRow)]
struct DbBooking {
    id: String,
    hostel_id: String,
    student_id: String,
    room_type: Option<String>,
    check_in_date: String,
    stay_duration_months: i64,
    quoted_rent_monthly: i64,
    security_deposit: i64,
    advance_amount: i64,
    total_amount: i64,
    currency: String,
    status: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl DbBooking {
    fn into_domain(self) -> Result<Booking, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Booking {
            id: parse(&self.id, "bookings.id")?,
            hostel_id: parse(&self.hostel_id, "bookings.hostel_id")?,
            student_id: parse(&self.student_id, "bookings.student_id")?,
            room_type: self.room_type,
            check_in_date: parse_date(&self.check_in_date)?,
            stay_duration_months: u32::try_from(self.stay_duration_months)
                .map_err(|e| RepoError::Database(e.to_string()))?,
            quoted_rent_monthly: from_minor(self.quoted_rent_monthly, currency)?,
            security_deposit: from_minor(self.security_deposit, currency)?,
            advance_amount: from_minor(self.advance_amount, currency)?,
            total_amount: from_minor(self.total_amount, currency)?,
            currency,
            status: parse(&self.status, "bookings.status")?,
            version: self.version,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, hostel_id, payer_id, student_id, booking_id, schedule_id, \
    payment_type, amount, currency, method, status, due_date, paid_at, failed_at, failure_reason, \
    gateway_order_id, gateway_payment_id, transaction_reference, receipt_number, description, \
    idempotency_key, refunded_amount, version, created_at, updated_at";

#[derive(FromRow)]
struct DbPayment {
    id: String,
    hostel_id: String,
    payer_id: String,
    student_id: Option<String>,
    booking_id: Option<String>,
    schedule_id: Option<String>,
    payment_type: String,
    amount: i64,
    currency: String,
    method: String,
    status: String,
    due_date: Option<String>,
    paid_at: Option<String>,
    failed_at: Option<String>,
    failure_reason: Option<String>,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    transaction_reference: Option<String>,
    receipt_number: Option<String>,
    description: Option<String>,
    idempotency_key: Option<String>,
    refunded_amount: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl DbPayment {
    fn into_domain(self) -> Result<Payment, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Payment {
            id: parse(&self.id, "payments.id")?,
            hostel_id: parse(&self.hostel_id, "payments.hostel_id")?,
            payer_id: parse(&self.payer_id, "payments.payer_id")?,
            student_id: parse_opt(self.student_id.as_deref(), "payments.student_id")?,
            booking_id: parse_opt(self.booking_id.as_deref(), "payments.booking_id")?,
            schedule_id: parse_opt(self.schedule_id.as_deref(), "payments.schedule_id")?,
            payment_type: parse(&self.payment_type, "payments.payment_type")?,
            amount: from_minor(self.amount, currency)?,
            currency,
            method: parse(&self.method, "payments.method")?,
            status: parse(&self.status, "payments.status")?,
            due_date: parse_date_opt(self.due_date.as_deref())?,
            paid_at: parse_ts_opt(self.paid_at.as_deref())?,
            failed_at: parse_ts_opt(self.failed_at.as_deref())?,
            failure_reason: self.failure_reason,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            transaction_reference: self.transaction_reference,
            receipt_number: self.receipt_number,
            description: self.description,
            idempotency_key: self.idempotency_key,
            refunded_amount: from_minor(self.refunded_amount, currency)?,
            version: self.version,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const REFUND_COLUMNS: &str = "id, payment_id, hostel_id, amount, currency, reason, status, \
    gateway_refund_id, rejection_reason, requested_at, processed_at, version";

#[derive(FromRow)]
struct DbRefund {
    id: String,
    payment_id: String,
    hostel_id: String,
    amount: i64,
    currency: String,
    reason: String,
    status: String,
    gateway_refund_id: Option<String>,
    rejection_reason: Option<String>,
    requested_at: String,
    processed_at: Option<String>,
    version: i64,
}

impl DbRefund {
    fn into_domain(self) -> Result<Refund, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Refund {
            id: parse(&self.id, "refunds.id")?,
            payment_id: parse(&self.payment_id, "refunds.payment_id")?,
            hostel_id: parse(&self.hostel_id, "refunds.hostel_id")?,
            amount: from_minor(self.amount, currency)?,
            currency,
            reason: self.reason,
            status: parse(&self.status, "refunds.status")?,
            gateway_refund_id: self.gateway_refund_id,
            rejection_reason: self.rejection_reason,
            requested_at: parse_ts(&self.requested_at)?,
            processed_at: parse_ts_opt(self.processed_at.as_deref())?,
            version: self.version,
        })
    }
}

const SCHEDULE_COLUMNS: &str = "id, hostel_id, payer_id, student_id, booking_id, payment_type, \
    amount, currency, method, frequency, start_date, end_date, next_due_date, \
    installments_generated, status, description, version, created_at, updated_at";

#[derive(FromRow)]
struct DbSchedule {
    id: String,
    hostel_id: String,
    payer_id: String,
    student_id: Option<String>,
    booking_id: Option<String>,
    payment_type: String,
    amount: i64,
    currency: String,
    method: String,
    frequency: String,
    start_date: String,
    end_date: Option<String>,
    next_due_date: String,
    installments_generated: i64,
    status: String,
    description: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl DbSchedule {
    fn into_domain(self) -> Result<PaymentSchedule, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(PaymentSchedule {
            id: parse(&self.id, "payment_schedules.id")?,
            hostel_id: parse(&self.hostel_id, "payment_schedules.hostel_id")?,
            payer_id: parse(&self.payer_id, "payment_schedules.payer_id")?,
            student_id: parse_opt(self.student_id.as_deref(), "payment_schedules.student_id")?,
            booking_id: parse_opt(self.booking_id.as_deref(), "payment_schedules.booking_id")?,
            payment_type: parse(&self.payment_type, "payment_schedules.payment_type")?,
            amount: from_minor(self.amount, currency)?,
            currency,
            method: parse(&self.method, "payment_schedules.method")?,
            frequency: parse(&self.frequency, "payment_schedules.frequency")?,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date_opt(self.end_date.as_deref())?,
            next_due_date: parse_date(&self.next_due_date)?,
            installments_generated: u32::try_from(self.installments_generated)
                .map_err(|e| RepoError::Database(e.to_string()))?,
            status: parse(&self.status, "payment_schedules.status")?,
            description: self.description,
            version: self.version,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const REMINDER_COLUMNS: &str = "id, payment_id, hostel_id, kind, reminder_date, created_at";

#[derive(FromRow)]
struct DbReminder {
    id: String,
    payment_id: String,
    hostel_id: String,
    kind: String,
    reminder_date: String,
    created_at: String,
}

impl DbReminder {
    fn into_domain(self) -> Result<Reminder, RepoError> {
        Ok(Reminder {
            id: parse(&self.id, "payment_reminders.id")?,
            payment_id: parse(&self.payment_id, "payment_reminders.payment_id")?,
            hostel_id: parse(&self.hostel_id, "payment_reminders.hostel_id")?,
            kind: parse(&self.kind, "payment_reminders.kind")?,
            reminder_date: parse_date(&self.reminder_date)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

const API_KEY_COLUMNS: &str = "id, name, key_hash, hostel_id, is_active, created_at, last_used_at";

#[derive(FromRow)]
struct DbApiKey {
    id: String,
    name: String,
    key_hash: String,
    hostel_id: Option<String>,
    is_active: bool,
    created_at: String,
    last_used_at: Option<String>,
}

impl DbApiKey {
    fn into_domain(self) -> Result<ApiKey, RepoError> {
        Ok(ApiKey {
            id: parse(&self.id, "api_keys.id")?,
            name: self.name,
            key_hash: self.key_hash,
            hostel_id: parse_opt(self.hostel_id.as_deref(), "api_keys.hostel_id")?,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
            last_used_at: parse_ts_opt(self.last_used_at.as_deref())?,
        })
    }
}

const ENDPOINT_COLUMNS: &str = "id, url, secret, events, is_active, created_at";

#[derive(FromRow)]
struct DbWebhookEndpoint {
    id: String,
    url: String,
    secret: String,
    events: String,
    is_active: bool,
    created_at: String,
}

impl DbWebhookEndpoint {
    fn into_domain(self) -> Result<WebhookEndpoint, RepoError> {
        let events: Vec<EventType> = serde_json::from_str(&self.events)
            .map_err(|e| RepoError::Database(format!("Invalid webhook_endpoints.events: {e}")))?;
        Ok(WebhookEndpoint {
            id: parse(&self.id, "webhook_endpoints.id")?,
            url: self.url,
            secret: self.secret,
            events,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbPendingWebhook {
    id: String,
    endpoint_id: String,
    event_type: String,
    payload: String,
    status: String,
    created_at: String,
    processed_at: Option<String>,
    attempts: i32,
    last_error: Option<String>,
    url: String,
    secret: String,
    endpoint_events: String,
    endpoint_active: bool,
    endpoint_created_at: String,
}

impl DbPendingWebhook {
    fn into_domain(self) -> Result<(WebhookEvent, WebhookEndpoint), RepoError> {
        let endpoint = DbWebhookEndpoint {
            id: self.endpoint_id.clone(),
            url: self.url,
            secret: self.secret,
            events: self.endpoint_events,
            is_active: self.endpoint_active,
            created_at: self.endpoint_created_at,
        }
        .into_domain()?;

        let event = WebhookEvent {
            id: parse(&self.id, "webhook_events.id")?,
            endpoint_id: endpoint.id,
            event_type: parse(&self.event_type, "webhook_events.event_type")?,
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| RepoError::Database(format!("Invalid webhook payload: {e}")))?,
            status: parse(&self.status, "webhook_events.status")?,
            created_at: parse_ts(&self.created_at)?,
            processed_at: parse_ts_opt(self.processed_at.as_deref())?,
            attempts: self.attempts,
            last_error: self.last_error,
        };
        Ok((event, endpoint))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit of work writes
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_booking(conn: &mut SqliteConnection, b: &Booking) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO bookings (id, hostel_id, student_id, room_type, check_in_date,
               stay_duration_months, quoted_rent_monthly, security_deposit, advance_amount,
               total_amount, currency, status, version, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(b.id.to_string())
    .bind(b.hostel_id.to_string())
    .bind(b.student_id.to_string())
    .bind(&b.room_type)
    .bind(date(b.check_in_date))
    .bind(i64::from(b.stay_duration_months))
    .bind(to_minor(b.quoted_rent_monthly, b.currency)?)
    .bind(to_minor(b.security_deposit, b.currency)?)
    .bind(to_minor(b.advance_amount, b.currency)?)
    .bind(to_minor(b.total_amount, b.currency)?)
    .bind(b.currency.to_string())
    .bind(b.status.as_str())
    .bind(b.version)
    .bind(ts(b.created_at))
    .bind(ts(b.updated_at))
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_booking(conn: &mut SqliteConnection, b: &Booking) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE bookings SET status = ?, version = version + 1, updated_at = ?
           WHERE id = ? AND version = ?"#,
    )
    .bind(b.status.as_str())
    .bind(ts(b.updated_at))
    .bind(b.id.to_string())
    .bind(b.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("booking", b.id));
    }
    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, p: &Payment) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payments (id, hostel_id, payer_id, student_id, booking_id, schedule_id,
               payment_type, amount, currency, method, status, due_date, paid_at, failed_at,
               failure_reason, gateway_order_id, gateway_payment_id, transaction_reference,
               receipt_number, description, idempotency_key, refunded_amount, version,
               created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(p.id.to_string())
    .bind(p.hostel_id.to_string())
    .bind(p.payer_id.to_string())
    .bind(p.student_id.map(|id| id.to_string()))
    .bind(p.booking_id.map(|id| id.to_string()))
    .bind(p.schedule_id.map(|id| id.to_string()))
    .bind(p.payment_type.as_str())
    .bind(to_minor(p.amount, p.currency)?)
    .bind(p.currency.to_string())
    .bind(p.method.as_str())
    .bind(p.status.as_str())
    .bind(date_opt(p.due_date))
    .bind(ts_opt(p.paid_at))
    .bind(ts_opt(p.failed_at))
    .bind(&p.failure_reason)
    .bind(&p.gateway_order_id)
    .bind(&p.gateway_payment_id)
    .bind(&p.transaction_reference)
    .bind(&p.receipt_number)
    .bind(&p.description)
    .bind(&p.idempotency_key)
    .bind(to_minor(p.refunded_amount, p.currency)?)
    .bind(p.version)
    .bind(ts(p.created_at))
    .bind(ts(p.updated_at))
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_payment(conn: &mut SqliteConnection, p: &Payment) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE payments SET method = ?, status = ?, paid_at = ?, failed_at = ?,
               failure_reason = ?, gateway_order_id = ?, gateway_payment_id = ?,
               transaction_reference = ?, receipt_number = ?, refunded_amount = ?,
               version = version + 1, updated_at = ?
           WHERE id = ? AND version = ?"#,
    )
    .bind(p.method.as_str())
    .bind(p.status.as_str())
    .bind(ts_opt(p.paid_at))
    .bind(ts_opt(p.failed_at))
    .bind(&p.failure_reason)
    .bind(&p.gateway_order_id)
    .bind(&p.gateway_payment_id)
    .bind(&p.transaction_reference)
    .bind(&p.receipt_number)
    .bind(to_minor(p.refunded_amount, p.currency)?)
    .bind(ts(p.updated_at))
    .bind(p.id.to_string())
    .bind(p.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("payment", p.id));
    }
    Ok(())
}

async fn insert_refund(conn: &mut SqliteConnection, r: &Refund) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO refunds (id, payment_id, hostel_id, amount, currency, reason, status,
               gateway_refund_id, rejection_reason, requested_at, processed_at, version)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(r.id.to_string())
    .bind(r.payment_id.to_string())
    .bind(r.hostel_id.to_string())
    .bind(to_minor(r.amount, r.currency)?)
    .bind(r.currency.to_string())
    .bind(&r.reason)
    .bind(r.status.as_str())
    .bind(&r.gateway_refund_id)
    .bind(&r.rejection_reason)
    .bind(ts(r.requested_at))
    .bind(ts_opt(r.processed_at))
    .bind(r.version)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_refund(conn: &mut SqliteConnection, r: &Refund) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE refunds SET status = ?, gateway_refund_id = ?, rejection_reason = ?,
               processed_at = ?, version = version + 1
           WHERE id = ? AND version = ?"#,
    )
    .bind(r.status.as_str())
    .bind(&r.gateway_refund_id)
    .bind(&r.rejection_reason)
    .bind(ts_opt(r.processed_at))
    .bind(r.id.to_string())
    .bind(r.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("refund", r.id));
    }
    Ok(())
}

async fn insert_schedule(
    conn: &mut SqliteConnection,
    s: &PaymentSchedule,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_schedules (id, hostel_id, payer_id, student_id, booking_id,
               payment_type, amount, currency, method, frequency, start_date, end_date,
               next_due_date, installments_generated, status, description, version, created_at,
               updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(s.id.to_string())
    .bind(s.hostel_id.to_string())
    .bind(s.payer_id.to_string())
    .bind(s.student_id.map(|id| id.to_string()))
    .bind(s.booking_id.map(|id| id.to_string()))
    .bind(s.payment_type.as_str())
    .bind(to_minor(s.amount, s.currency)?)
    .bind(s.currency.to_string())
    .bind(s.method.as_str())
    .bind(s.frequency.as_str())
    .bind(date(s.start_date))
    .bind(date_opt(s.end_date))
    .bind(date(s.next_due_date))
    .bind(i64::from(s.installments_generated))
    .bind(s.status.as_str())
    .bind(&s.description)
    .bind(s.version)
    .bind(ts(s.created_at))
    .bind(ts(s.updated_at))
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_schedule(
    conn: &mut SqliteConnection,
    s: &PaymentSchedule,
) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE payment_schedules SET next_due_date = ?, installments_generated = ?,
               status = ?, version = version + 1, updated_at = ?
           WHERE id = ? AND version = ?"#,
    )
    .bind(date(s.next_due_date))
    .bind(i64::from(s.installments_generated))
    .bind(s.status.as_str())
    .bind(ts(s.updated_at))
    .bind(s.id.to_string())
    .bind(s.version)
    .execute(conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(stale("schedule", s.id));
    }
    Ok(())
}

async fn insert_reminder(conn: &mut SqliteConnection, r: &Reminder) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_reminders (id, payment_id, hostel_id, kind, reminder_date, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(r.id.to_string())
    .bind(r.payment_id.to_string())
    .bind(r.hostel_id.to_string())
    .bind(r.kind.as_str())
    .bind(date(r.reminder_date))
    .bind(ts(r.created_at))
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Writes one outbox row per subscribed endpoint.
async fn enqueue_events(
    conn: &mut SqliteConnection,
    events: &[DomainEvent],
) -> Result<usize, RepoError> {
    if events.is_empty() {
        return Ok(0);
    }

    let rows: Vec<DbWebhookEndpoint> = sqlx::query_as(&format!(
        "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE is_active = 1"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    let endpoints = rows
        .into_iter()
        .map(DbWebhookEndpoint::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

    let mut queued = 0;
    for event in events {
        for row in event.fan_out(&endpoints) {
            sqlx::query(
                r#"INSERT INTO webhook_events (id, endpoint_id, event_type, payload, status, created_at, attempts)
                   VALUES (?, ?, ?, ?, ?, ?, 0)"#,
            )
            .bind(row.id.to_string())
            .bind(row.endpoint_id.to_string())
            .bind(row.event_type.as_str())
            .bind(row.payload.to_string())
            .bind(row.status.as_str())
            .bind(ts(row.created_at))
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
impl HostelRepository for SqliteRepo {
    async fn create_hostel(&self, hostel: &Hostel) -> Result<(), RepoError> {
        sqlx::query(r#"INSERT INTO hostels (id, name, currency, created_at) VALUES (?, ?, ?, ?)"#)
            .bind(hostel.id.to_string())
            .bind(&hostel.name)
            .bind(hostel.currency.to_string())
            .bind(ts(hostel.created_at))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_hostel(&self, id: HostelId) -> Result<Option<Hostel>, RepoError> {
        let row: Option<DbHostel> =
            sqlx::query_as(&format!("SELECT {HOSTEL_COLUMNS} FROM hostels WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbHostel::into_domain).transpose()
    }

    async fn list_hostels(&self) -> Result<Vec<Hostel>, RepoError> {
        let rows: Vec<DbHostel> =
            sqlx::query_as(&format!("SELECT {HOSTEL_COLUMNS} FROM hostels ORDER BY name"))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter().map(DbHostel::into_domain).collect()
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError> {
        let row: Option<DbBooking> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbBooking::into_domain).transpose()
    }

    async fn list_bookings(&self, hostel_id: HostelId) -> Result<Vec<Booking>, RepoError> {
        let rows: Vec<DbBooking> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE hostel_id = ? ORDER BY created_at DESC"
        ))
        .bind(hostel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbBooking::into_domain).collect()
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let row: Option<DbPayment> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbPayment::into_domain).transpose()
    }

    async fn find_payment_by_idempotency_key(
        &self,
        hostel_id: HostelId,
        key: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<DbPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE hostel_id = ? AND idempotency_key = ?"
        ))
        .bind(hostel_id.to_string())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbPayment::into_domain).transpose()
    }

    async fn find_payment_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<DbPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_order_id = ?"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbPayment::into_domain).transpose()
    }

    async fn find_payment_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let row: Option<DbPayment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_payment_id = ? LIMIT 1"
        ))
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbPayment::into_domain).transpose()
    }

    async fn list_payments(&self, query: &PaymentListQuery) -> Result<Vec<Payment>, RepoError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1 = 1"));
        if let Some(hostel_id) = query.hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.to_string());
        }
        if let Some(student_id) = query.student_id {
            qb.push(" AND student_id = ").push_bind(student_id.to_string());
        }
        if let Some(booking_id) = query.booking_id {
            qb.push(" AND booking_id = ").push_bind(booking_id.to_string());
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.due_from {
            qb.push(" AND due_date >= ").push_bind(date(from));
        }
        if let Some(to) = query.due_to {
            qb.push(" AND due_date <= ").push_bind(date(to));
        }
        qb.push(" ORDER BY due_date IS NULL, due_date, created_at");

        let rows: Vec<DbPayment> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(DbPayment::into_domain).collect()
    }

    async fn list_open_payments(
        &self,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<Payment>, RepoError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE due_date IS NOT NULL AND status IN ("
        ));
        qb.push_bind(PaymentStatus::Pending.as_str())
            .push(", ")
            .push_bind(PaymentStatus::Processing.as_str())
            .push(")");
        if let Some(hostel_id) = hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.to_string());
        }
        qb.push(" ORDER BY due_date, created_at");

        let rows: Vec<DbPayment> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(DbPayment::into_domain).collect()
    }

    async fn get_refund(&self, id: RefundId) -> Result<Option<Refund>, RepoError> {
        let row: Option<DbRefund> =
            sqlx::query_as(&format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbRefund::into_domain).transpose()
    }

    async fn find_refund_by_gateway_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<Refund>, RepoError> {
        let row: Option<DbRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE gateway_refund_id = ?"
        ))
        .bind(gateway_refund_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbRefund::into_domain).transpose()
    }

    async fn list_refunds_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Refund>, RepoError> {
        let rows: Vec<DbRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE payment_id = ? ORDER BY requested_at"
        ))
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbRefund::into_domain).collect()
    }

    async fn list_refunds(&self, hostel_id: HostelId) -> Result<Vec<Refund>, RepoError> {
        let rows: Vec<DbRefund> = sqlx::query_as(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE hostel_id = ? ORDER BY requested_at"
        ))
        .bind(hostel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbRefund::into_domain).collect()
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<PaymentSchedule>, RepoError> {
        let row: Option<DbSchedule> = sqlx::query_as(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbSchedule::into_domain).transpose()
    }

    async fn list_schedules(
        &self,
        hostel_id: HostelId,
    ) -> Result<Vec<PaymentSchedule>, RepoError> {
        let rows: Vec<DbSchedule> = sqlx::query_as(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE hostel_id = ? ORDER BY created_at"
        ))
        .bind(hostel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbSchedule::into_domain).collect()
    }

    async fn list_due_schedules(
        &self,
        as_of: NaiveDate,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<PaymentSchedule>, RepoError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE status = 'active' AND next_due_date <= "
        ));
        qb.push_bind(date(as_of));
        if let Some(hostel_id) = hostel_id {
            qb.push(" AND hostel_id = ").push_bind(hostel_id.to_string());
        }
        qb.push(" ORDER BY next_due_date");

        let rows: Vec<DbSchedule> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(DbSchedule::into_domain).collect()
    }

    async fn list_reminders_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Reminder>, RepoError> {
        let rows: Vec<DbReminder> = sqlx::query_as(&format!(
            "SELECT {REMINDER_COLUMNS} FROM payment_reminders WHERE payment_id = ? ORDER BY reminder_date, created_at"
        ))
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbReminder::into_domain).collect()
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
        let row: Option<DbApiKey> = sqlx::query_as(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = ? AND is_active = 1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let now = Utc::now();
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(ts(now))
            .bind(&row.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let mut key = row.into_domain()?;
        key.last_used_at = Some(now);
        Ok(Some(key))
    }

    async fn create_api_key(&self, key: &ApiKey) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO api_keys (id, name, key_hash, hostel_id, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(key.id.to_string())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.hostel_id.map(|id| id.to_string()))
        .bind(key.is_active)
        .bind(ts(key.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn count_api_keys(&self) -> Result<i64, RepoError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_keys WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError> {
        let rows: Vec<DbApiKey> = sqlx::query_as(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE is_active = 1 ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbApiKey::into_domain).collect()
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ? AND is_active = 1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_webhook_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), RepoError> {
        let events = serde_json::to_string(&endpoint.events)
            .map_err(|e| RepoError::Database(e.to_string()))?;
        sqlx::query(
            r#"INSERT INTO webhook_endpoints (id, url, secret, events, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(endpoint.id.to_string())
        .bind(&endpoint.url)
        .bind(&endpoint.secret)
        .bind(events)
        .bind(endpoint.is_active)
        .bind(ts(endpoint.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_webhook_endpoints(&self) -> Result<Vec<WebhookEndpoint>, RepoError> {
        let rows: Vec<DbWebhookEndpoint> = sqlx::query_as(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE is_active = 1 ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbWebhookEndpoint::into_domain).collect()
    }

    async fn get_pending_webhooks(
        &self,
        limit: i64,
    ) -> Result<Vec<(WebhookEvent, WebhookEndpoint)>, RepoError> {
        let rows: Vec<DbPendingWebhook> = sqlx::query_as(
            r#"
            SELECT e.id, e.endpoint_id, e.event_type, e.payload, e.status, e.created_at,
                   e.processed_at, e.attempts, e.last_error,
                   w.url, w.secret, w.events AS endpoint_events,
                   w.is_active AS endpoint_active, w.created_at AS endpoint_created_at
            FROM webhook_events e
            JOIN webhook_endpoints w ON w.id = e.endpoint_id
            WHERE e.status = 'pending'
            ORDER BY e.created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbPendingWebhook::into_domain).collect()
    }

    async fn update_webhook_status(
        &self,
        id: Uuid,
        status: WebhookStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError> {
        let processed_at = matches!(status, WebhookStatus::Completed | WebhookStatus::Failed)
            .then(|| ts(Utc::now()));

        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = ?, processed_at = ?, last_error = ?, attempts = attempts + 1
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(processed_at)
        .bind(last_error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
