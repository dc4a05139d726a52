//! Client example walking a booking from request to refund against a live server.
//!
//! Run with: cargo run -p hostel-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;

use rust_decimal_macros::dec;
use tempfile::tempdir;
use tokio::net::TcpListener;
use uuid::Uuid;

use hostel_client::{BookingAction, HostelClient};
use hostel_hex::{Services, inbound::HttpServer};
use hostel_repo::{SandboxGateway, build_repo};
use hostel_types::{
    CreateBookingRequest, CreateHostelRequest, CreateRefundRequest, Currency, LedgerQuery,
    RequestAdvanceRequest, SummaryQuery, VerifyCheckoutRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    let tmp = tempdir()?;
    let db_path = tmp.path().join("hostel.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    let repo = build_repo(&db_url).await?;
    let server = HttpServer::new(Services::new(repo, SandboxGateway::default()));
    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        if let Err(e) = server.run(&server_addr).await {
            eprintln!("server stopped: {e}");
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let client = HostelClient::new(format!("http://127.0.0.1:{port}"));
    println!("✅ Server health: {}", client.health().await?);

    let denied = client.list_hostels().await;
    assert!(denied.is_err());
    println!("✅ Unauthorized without key: {}", denied.unwrap_err());

    let key = client.bootstrap("example").await?;
    println!("✅ Admin key issued: {}", key.api_key);
    let client = client.with_api_key(key.api_key);

    let hostel = client
        .create_hostel(&CreateHostelRequest {
            name: "Green Park Boys Hostel".into(),
            currency: Currency::INR,
        })
        .await?;
    println!("✅ Created hostel: {} (id={})", hostel.name, hostel.id);

    // Booking: six months at 8500 with a 5000 advance
    let booking = client
        .create_booking(&CreateBookingRequest {
            hostel_id: hostel.id,
            student_id: Uuid::new_v4(),
            room_type: Some("double".into()),
            check_in_date: chrono::Utc::now().date_naive(),
            stay_duration_months: 6,
            quoted_rent_monthly: dec!(8500),
            security_deposit: dec!(10000),
            advance_amount: dec!(5000),
            total_amount: None,
        })
        .await?;
    println!("✅ Booking {} total {}", booking.id, booking.total_amount);

    let booking = client.booking_action(booking.id, BookingAction::Approve).await?;
    println!("   status: {}", booking.status);

    let advance = client
        .request_advance(booking.id, &RequestAdvanceRequest::default())
        .await?;
    println!("✅ Advance payment {} for {}", advance.id, advance.amount);

    // Pay through the sandbox gateway and sign the result like a checkout widget would
    let checkout = client.checkout(advance.id).await?;
    let gateway_payment_id = format!("pay_example_{}", Uuid::new_v4().simple());
    let signature = SandboxGateway::default().sign_checkout(&checkout.order.order_id, &gateway_payment_id);
    let paid = client
        .verify_checkout(&VerifyCheckoutRequest {
            order_id: checkout.order.order_id.clone(),
            gateway_payment_id,
            signature,
        })
        .await?;
    println!("✅ Advance {} via order {}", paid.status, checkout.order.order_id);

    let booking = client.get_booking(booking.id).await?;
    println!("   booking now: {}", booking.status);

    let refund = client
        .request_refund(
            paid.id,
            &CreateRefundRequest {
                amount: dec!(1000),
                reason: "Room downgrade".into(),
            },
        )
        .await?;
    let processed = client.process_refund(refund.id).await?;
    println!(
        "✅ Refunded {} (payment refunded_amount={})",
        processed.refund.amount, processed.payment.refunded_amount
    );

    let ledger = client.ledger(hostel.id, &LedgerQuery::default()).await?;
    println!("\n📒 Ledger:");
    for entry in &ledger.entries {
        println!(
            "   {} {:>10} {:>10} balance {:>10}",
            entry.occurred_at.date_naive(),
            entry.debit,
            entry.credit,
            entry.balance
        );
    }
    println!("   closing balance: {}", ledger.closing_balance);

    let summary = client.summary(hostel.id, &SummaryQuery::default()).await?;
    println!(
        "\n📊 Collected {} / refunded {} / net {}",
        summary.total_collected, summary.total_refunded, summary.net_collected
    );

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
