//! Hostel CLI
//!
//! Command-line interface for the hostel payments API.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use hostel_client::{BookingAction, HostelClient, ScheduleAction};
use hostel_types::{
    ApiKeyId, BookingId, CreateBookingRequest, CreateHostelRequest, CreatePaymentRequest,
    CreateRefundRequest, CreateScheduleRequest, Currency, DispatchRemindersRequest, EventType,
    Frequency, GenerateDueRequest, HostelId, LedgerQuery, ManualPaymentRequest, PaymentId,
    PaymentListQuery, PaymentMethod, PaymentStatus, PaymentType, RefundId, RegisterWebhookRequest,
    RequestAdvanceRequest, ScheduleId, SummaryQuery, VerifyCheckoutRequest,
};

#[derive(Parser)]
#[command(name = "hostel")]
#[command(author, version, about = "Hostel payments API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the hostel payments API
    #[arg(long, env = "HOSTEL_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// API key for authentication
    #[arg(long, env = "HOSTEL_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Issue the first (global) API key
    Bootstrap {
        #[arg(long, default_value = "bootstrap-key")]
        name: String,
    },
    /// API key management
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Outbound webhook endpoints
    Webhook {
        #[command(subcommand)]
        action: WebhookCommands,
    },
    /// Hostels
    Hostel {
        #[command(subcommand)]
        action: HostelCommands,
    },
    /// Bookings and their workflow
    Booking {
        #[command(subcommand)]
        action: BookingCommands,
    },
    /// Payments
    Payment {
        #[command(subcommand)]
        action: PaymentCommands,
    },
    /// Refunds against completed payments
    Refund {
        #[command(subcommand)]
        action: RefundCommands,
    },
    /// Recurring payment schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommands,
    },
    /// Payment reminders
    Reminder {
        #[command(subcommand)]
        action: ReminderCommands,
    },
    /// Ledger and reports for a hostel
    Report {
        #[command(subcommand)]
        action: ReportCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Create a new API key
    Create {
        #[arg(long)]
        name: String,
        /// Confine the key to one hostel
        #[arg(long)]
        hostel: Option<HostelId>,
    },
    /// List all API keys
    List,
    /// Deactivate an API key
    Delete {
        #[arg(long)]
        id: ApiKeyId,
    },
}

#[derive(Subcommand)]
enum WebhookCommands {
    /// Register a new webhook endpoint
    Register {
        #[arg(long)]
        url: String,
        /// Event types to subscribe to (comma-separated); all when omitted
        #[arg(long, value_delimiter = ',')]
        events: Vec<EventType>,
    },
    /// List registered webhook endpoints
    List,
    /// Print deliveries arriving on a local port
    Listen {
        #[arg(long, default_value = "4000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum HostelCommands {
    Create {
        name: String,
        #[arg(long, default_value = "INR")]
        currency: Currency,
    },
    Get {
        id: HostelId,
    },
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum BookingStep {
    Approve,
    Reject,
    Confirm,
    CheckIn,
    CheckOut,
    Cancel,
}

impl From<BookingStep> for BookingAction {
    fn from(step: BookingStep) -> Self {
        match step {
            BookingStep::Approve => BookingAction::Approve,
            BookingStep::Reject => BookingAction::Reject,
            BookingStep::Confirm => BookingAction::Confirm,
            BookingStep::CheckIn => BookingAction::CheckIn,
            BookingStep::CheckOut => BookingAction::CheckOut,
            BookingStep::Cancel => BookingAction::Cancel,
        }
    }
}

#[derive(Subcommand)]
enum BookingCommands {
    Create {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        room_type: Option<String>,
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        months: u32,
        #[arg(long)]
        rent: Decimal,
        #[arg(long, default_value = "0")]
        deposit: Decimal,
        #[arg(long, default_value = "0")]
        advance: Decimal,
    },
    Get {
        id: BookingId,
    },
    /// List the bookings of a hostel
    List {
        #[arg(long)]
        hostel: HostelId,
    },
    /// Move a booking through its workflow
    Step {
        id: BookingId,
        #[arg(value_enum)]
        action: BookingStep,
    },
    /// Request the advance payment for a booking
    Advance {
        id: BookingId,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        method: Option<PaymentMethod>,
    },
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Create a pending payment
    Create {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        payer: Uuid,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long, value_name = "TYPE")]
        kind: PaymentType,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "upi")]
        method: PaymentMethod,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Record money received offline
    Manual {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        payer: Uuid,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long, value_name = "TYPE")]
        kind: PaymentType,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        method: PaymentMethod,
        #[arg(long)]
        reference: String,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    Get {
        id: PaymentId,
    },
    List {
        #[arg(long)]
        hostel: Option<HostelId>,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long)]
        status: Option<PaymentStatus>,
        #[arg(long)]
        due_from: Option<NaiveDate>,
        #[arg(long)]
        due_to: Option<NaiveDate>,
    },
    /// Overdue payments of a hostel
    Overdue {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Open a gateway checkout order
    Checkout {
        id: PaymentId,
    },
    /// Verify a completed checkout
    Verify {
        #[arg(long)]
        order: String,
        #[arg(long)]
        gateway_payment: String,
        #[arg(long)]
        signature: String,
    },
}

#[derive(Subcommand)]
enum RefundCommands {
    Request {
        #[arg(long)]
        payment: PaymentId,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reason: String,
    },
    List {
        #[arg(long)]
        payment: PaymentId,
    },
    Process {
        id: RefundId,
    },
    Reject {
        id: RefundId,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleStep {
    Pause,
    Resume,
    Cancel,
}

impl From<ScheduleStep> for ScheduleAction {
    fn from(step: ScheduleStep) -> Self {
        match step {
            ScheduleStep::Pause => ScheduleAction::Pause,
            ScheduleStep::Resume => ScheduleAction::Resume,
            ScheduleStep::Cancel => ScheduleAction::Cancel,
        }
    }
}

#[derive(Subcommand)]
enum ScheduleCommands {
    Create {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        payer: Uuid,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long, value_name = "TYPE", default_value = "rent")]
        kind: PaymentType,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "upi")]
        method: PaymentMethod,
        #[arg(long, default_value = "monthly")]
        frequency: Frequency,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    Get {
        id: ScheduleId,
    },
    List {
        #[arg(long)]
        hostel: HostelId,
    },
    Step {
        id: ScheduleId,
        #[arg(value_enum)]
        action: ScheduleStep,
        /// Reference date for resume
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Generate payments that have fallen due
    Generate {
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        hostel: Option<HostelId>,
    },
}

#[derive(Subcommand)]
enum ReminderCommands {
    Dispatch {
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        hostel: Option<HostelId>,
    },
    /// Reminder history of a payment
    List {
        #[arg(long)]
        payment: PaymentId,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    Ledger {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        opening_balance: Option<Decimal>,
    },
    Summary {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    Overdue {
        #[arg(long)]
        hostel: HostelId,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = HostelClient::new(&cli.api_url);
    if let Some(key) = cli.api_key {
        client = client.with_api_key(key);
    }

    match cli.command {
        Commands::Health => {
            if client.health().await? {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Bootstrap { name } => {
            let created = client.bootstrap(&name).await?;
            println!("{}", created.api_key);
        }

        Commands::Key { action } => match action {
            KeyCommands::Create { name, hostel } => {
                let created = client.create_api_key(&name, hostel).await?;
                println!("{}", created.api_key);
            }
            KeyCommands::List => print(&client.list_api_keys().await?)?,
            KeyCommands::Delete { id } => {
                client.delete_api_key(id).await?;
                println!("✓ API key deleted");
            }
        },

        Commands::Webhook { action } => match action {
            WebhookCommands::Register { url, events } => {
                let req = RegisterWebhookRequest { url, events };
                print(&client.register_webhook(&req).await?)?;
            }
            WebhookCommands::List => print(&client.list_webhooks().await?)?,
            WebhookCommands::Listen { port } => listen(port).await?,
        },

        Commands::Hostel { action } => match action {
            HostelCommands::Create { name, currency } => {
                let req = CreateHostelRequest { name, currency };
                print(&client.create_hostel(&req).await?)?;
            }
            HostelCommands::Get { id } => print(&client.get_hostel(id).await?)?,
            HostelCommands::List => print(&client.list_hostels().await?)?,
        },

        Commands::Booking { action } => match action {
            BookingCommands::Create {
                hostel,
                student,
                room_type,
                check_in,
                months,
                rent,
                deposit,
                advance,
            } => {
                let req = CreateBookingRequest {
                    hostel_id: hostel,
                    student_id: student,
                    room_type,
                    check_in_date: check_in,
                    stay_duration_months: months,
                    quoted_rent_monthly: rent,
                    security_deposit: deposit,
                    advance_amount: advance,
                    total_amount: None,
                };
                print(&client.create_booking(&req).await?)?;
            }
            BookingCommands::Get { id } => print(&client.get_booking(id).await?)?,
            BookingCommands::List { hostel } => print(&client.list_bookings(hostel).await?)?,
            BookingCommands::Step { id, action } => {
                print(&client.booking_action(id, action.into()).await?)?;
            }
            BookingCommands::Advance { id, due, method } => {
                let req = RequestAdvanceRequest {
                    due_date: due,
                    method,
                };
                print(&client.request_advance(id, &req).await?)?;
            }
        },

        Commands::Payment { action } => match action {
            PaymentCommands::Create {
                hostel,
                payer,
                student,
                kind,
                amount,
                method,
                due,
                description,
                idempotency_key,
            } => {
                let req = CreatePaymentRequest {
                    hostel_id: hostel,
                    payer_id: payer,
                    student_id: student,
                    booking_id: None,
                    payment_type: kind,
                    amount,
                    currency: None,
                    method,
                    due_date: due,
                    description,
                    idempotency_key,
                };
                print(&client.create_payment(&req).await?)?;
            }
            PaymentCommands::Manual {
                hostel,
                payer,
                student,
                kind,
                amount,
                method,
                reference,
                idempotency_key,
            } => {
                let req = ManualPaymentRequest {
                    hostel_id: hostel,
                    payer_id: payer,
                    student_id: student,
                    booking_id: None,
                    payment_type: kind,
                    amount,
                    currency: None,
                    method,
                    transaction_reference: reference,
                    paid_at: None,
                    description: None,
                    idempotency_key,
                };
                print(&client.record_manual_payment(&req).await?)?;
            }
            PaymentCommands::Get { id } => print(&client.get_payment(id).await?)?,
            PaymentCommands::List {
                hostel,
                student,
                status,
                due_from,
                due_to,
            } => {
                let query = PaymentListQuery {
                    hostel_id: hostel,
                    student_id: student,
                    booking_id: None,
                    status,
                    due_from,
                    due_to,
                };
                print(&client.list_payments(&query).await?)?;
            }
            PaymentCommands::Overdue { hostel, today } => {
                print(&client.list_overdue(hostel, today).await?)?;
            }
            PaymentCommands::Checkout { id } => print(&client.checkout(id).await?)?,
            PaymentCommands::Verify {
                order,
                gateway_payment,
                signature,
            } => {
                let req = VerifyCheckoutRequest {
                    order_id: order,
                    gateway_payment_id: gateway_payment,
                    signature,
                };
                print(&client.verify_checkout(&req).await?)?;
            }
        },

        Commands::Refund { action } => match action {
            RefundCommands::Request {
                payment,
                amount,
                reason,
            } => {
                let req = CreateRefundRequest { amount, reason };
                print(&client.request_refund(payment, &req).await?)?;
            }
            RefundCommands::List { payment } => print(&client.list_refunds(payment).await?)?,
            RefundCommands::Process { id } => print(&client.process_refund(id).await?)?,
            RefundCommands::Reject { id, reason } => {
                print(&client.reject_refund(id, &reason).await?)?;
            }
        },

        Commands::Schedule { action } => match action {
            ScheduleCommands::Create {
                hostel,
                payer,
                student,
                kind,
                amount,
                method,
                frequency,
                start,
                end,
            } => {
                let req = CreateScheduleRequest {
                    hostel_id: hostel,
                    payer_id: payer,
                    student_id: student,
                    booking_id: None,
                    payment_type: kind,
                    amount,
                    method,
                    frequency,
                    start_date: start,
                    end_date: end,
                    description: None,
                };
                print(&client.create_schedule(&req).await?)?;
            }
            ScheduleCommands::Get { id } => print(&client.get_schedule(id).await?)?,
            ScheduleCommands::List { hostel } => print(&client.list_schedules(hostel).await?)?,
            ScheduleCommands::Step { id, action, today } => {
                print(&client.schedule_action(id, action.into(), today).await?)?;
            }
            ScheduleCommands::Generate { as_of, hostel } => {
                let req = GenerateDueRequest {
                    as_of,
                    hostel_id: hostel,
                };
                print(&client.generate_due(&req).await?)?;
            }
        },

        Commands::Reminder { action } => match action {
            ReminderCommands::Dispatch { today, hostel } => {
                let req = DispatchRemindersRequest {
                    today,
                    hostel_id: hostel,
                };
                print(&client.dispatch_reminders(&req).await?)?;
            }
            ReminderCommands::List { payment } => print(&client.list_reminders(payment).await?)?,
        },

        Commands::Report { action } => match action {
            ReportCommands::Ledger {
                hostel,
                student,
                from,
                to,
                opening_balance,
            } => {
                let query = LedgerQuery {
                    student_id: student,
                    from,
                    to,
                    opening_balance,
                };
                print(&client.ledger(hostel, &query).await?)?;
            }
            ReportCommands::Summary {
                hostel,
                from,
                to,
                today,
            } => {
                let query = SummaryQuery { from, to, today };
                print(&client.summary(hostel, &query).await?)?;
            }
            ReportCommands::Overdue { hostel, today } => {
                print(&client.overdue_report(hostel, today).await?)?;
            }
        },
    }

    Ok(())
}

async fn listen(port: u16) -> Result<()> {
    let app = axum::Router::new().route("/webhook", axum::routing::post(handle_webhook));
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    println!("Listening for webhooks on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_webhook(
    headers: axum::http::HeaderMap,
    body: String,
) -> impl axum::response::IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    println!("event:     {}", header("x-webhook-event"));
    println!("signature: {}", header("x-webhook-signature"));
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json).unwrap_or(body)),
        Err(_) => println!("{}", body),
    }
    println!("----------------------------------------");
    axum::http::StatusCode::OK
}
