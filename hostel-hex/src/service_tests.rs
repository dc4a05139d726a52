//! Service layer tests against the in-memory SQLite repository and the
//! sandbox gateway.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use hostel_repo::{SandboxGateway, SqliteRepo};
    use hostel_types::domain::{
        GatewayOrder, GatewayOrderRequest, GatewayRefund, GatewayRefundRequest,
    };
    use hostel_types::{
        AppError, BookingStatus, BootstrapRequest, CreateApiKeyRequest, CreateBookingRequest,
        CreateHostelRequest, CreatePaymentRequest, CreateRefundRequest, CreateScheduleRequest,
        Currency, Frequency, GatewayError, Hostel, HostelRepository, LedgerQuery,
        ManualPaymentRequest, Payment, PaymentGateway, PaymentListQuery, PaymentMethod,
        PaymentStatus, PaymentType, Principal, RefundStatus, RejectRefundRequest, ReminderKind,
        RequestAdvanceRequest, SummaryQuery, UpdatePaymentStatusRequest, VerifyCheckoutRequest,
    };

    use crate::Services;

    pub(crate) type TestServices = Services<SqliteRepo, SandboxGateway>;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) async fn setup() -> (TestServices, Principal) {
        let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
        let services = Services::new(repo, SandboxGateway::default());
        let created = services
            .access
            .bootstrap(BootstrapRequest { name: "admin".into() })
            .await
            .unwrap();
        let admin = services
            .access
            .authenticate(&created.api_key)
            .await
            .unwrap()
            .unwrap();
        (services, admin)
    }

    async fn hostel(services: &TestServices, admin: &Principal) -> Hostel {
        services
            .hostels
            .create_hostel(
                admin,
                CreateHostelRequest {
                    name: "Green Park Boys Hostel".into(),
                    currency: Currency::INR,
                },
            )
            .await
            .unwrap()
    }

    fn payment_req(hostel: &Hostel, amount: Decimal) -> CreatePaymentRequest {
        CreatePaymentRequest {
            hostel_id: hostel.id,
            payer_id: Uuid::new_v4(),
            student_id: Some(Uuid::new_v4()),
            booking_id: None,
            payment_type: PaymentType::Rent,
            amount,
            currency: None,
            method: PaymentMethod::Upi,
            due_date: None,
            description: None,
            idempotency_key: None,
        }
    }

    fn manual_req(hostel: &Hostel, amount: Decimal) -> ManualPaymentRequest {
        ManualPaymentRequest {
            hostel_id: hostel.id,
            payer_id: Uuid::new_v4(),
            student_id: None,
            booking_id: None,
            payment_type: PaymentType::SecurityDeposit,
            amount,
            currency: None,
            method: PaymentMethod::Cash,
            transaction_reference: "CASH-0042".into(),
            paid_at: Some(Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap()),
            description: None,
            idempotency_key: None,
        }
    }

    fn booking_req(hostel: &Hostel) -> CreateBookingRequest {
        CreateBookingRequest {
            hostel_id: hostel.id,
            student_id: Uuid::new_v4(),
            room_type: Some("double".into()),
            check_in_date: date(2026, 7, 1),
            stay_duration_months: 6,
            quoted_rent_monthly: dec!(8500),
            security_deposit: dec!(10000),
            advance_amount: dec!(5000),
            total_amount: None,
        }
    }

    /// Sandbox gateway whose refunds are slow and counted.
    struct SlowRefundGateway {
        inner: SandboxGateway,
        refunds: Arc<AtomicUsize>,
        fail_refunds: bool,
    }

    impl SlowRefundGateway {
        fn new(fail_refunds: bool) -> (Self, Arc<AtomicUsize>) {
            let refunds = Arc::new(AtomicUsize::new(0));
            let gateway = Self {
                inner: SandboxGateway::default(),
                refunds: refunds.clone(),
                fail_refunds,
            };
            (gateway, refunds)
        }
    }

    #[async_trait::async_trait]
    impl PaymentGateway for SlowRefundGateway {
        fn provider(&self) -> &'static str {
            self.inner.provider()
        }

        fn key_id(&self) -> Option<String> {
            self.inner.key_id()
        }

        async fn create_order(
            &self,
            req: GatewayOrderRequest,
        ) -> Result<GatewayOrder, GatewayError> {
            self.inner.create_order(req).await
        }

        async fn refund(
            &self,
            req: GatewayRefundRequest,
        ) -> Result<GatewayRefund, GatewayError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.fail_refunds {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            self.inner.refund(req).await
        }

        fn verify_payment_signature(
            &self,
            order_id: &str,
            payment_id: &str,
            signature: &str,
        ) -> bool {
            self.inner.verify_payment_signature(order_id, payment_id, signature)
        }

        fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
            self.inner.verify_webhook_signature(body, signature)
        }
    }

    /// A hostel and a payment captured through the gateway checkout.
    async fn paid_online<G: PaymentGateway>(
        services: &Services<SqliteRepo, G>,
        admin: &Principal,
        amount: Decimal,
    ) -> Payment {
        let hostel = services
            .hostels
            .create_hostel(
                admin,
                CreateHostelRequest {
                    name: "Lakeview Hostel".into(),
                    currency: Currency::INR,
                },
            )
            .await
            .unwrap();
        let (payment, _) = services
            .payments
            .create_payment(admin, payment_req(&hostel, amount))
            .await
            .unwrap();
        let checkout = services
            .requests
            .initiate_online_payment(admin, payment.id)
            .await
            .unwrap();
        let signature =
            SandboxGateway::default().sign_checkout(&checkout.order.order_id, "pay_online1");
        services
            .gateway
            .verify_checkout(
                admin,
                VerifyCheckoutRequest {
                    order_id: checkout.order.order_id,
                    gateway_payment_id: "pay_online1".into(),
                    signature,
                },
            )
            .await
            .unwrap()
    }

    async fn slow_gateway_setup(
        fail_refunds: bool,
    ) -> (Services<SqliteRepo, SlowRefundGateway>, Principal, Arc<AtomicUsize>) {
        let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
        let (gateway, refunds) = SlowRefundGateway::new(fail_refunds);
        let services = Services::new(repo, gateway);
        let created = services
            .access
            .bootstrap(BootstrapRequest { name: "admin".into() })
            .await
            .unwrap();
        let admin = services
            .access
            .authenticate(&created.api_key)
            .await
            .unwrap()
            .unwrap();
        (services, admin, refunds)
    }

    async fn manual(services: &TestServices, admin: &Principal, hostel: &Hostel, amount: Decimal) -> Payment {
        let (payment, created) = services
            .requests
            .record_manual_payment(admin, manual_req(hostel, amount))
            .await
            .unwrap();
        assert!(created);
        payment
    }

    // ── payments ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_payment_quantizes_and_starts_pending() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let (payment, created) = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(8500.006)))
            .await
            .unwrap();

        assert!(created);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, dec!(8500.01));
        assert_eq!(payment.currency, Currency::INR);
    }

    #[tokio::test]
    async fn create_payment_rejects_non_positive_amounts() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        for amount in [dec!(0), dec!(-10)] {
            let err = services
                .payments
                .create_payment(&admin, payment_req(&hostel, amount))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{amount}: {err:?}");
        }
    }

    #[tokio::test]
    async fn create_payment_rejects_amounts_beyond_minor_units() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        // 79228162514264337593543950335, the largest representable decimal
        let err = services
            .payments
            .create_payment(&admin, payment_req(&hostel, Decimal::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(92233720368547758.08)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let (payment, _) = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(92233720368547758.07)))
            .await
            .unwrap();
        assert_eq!(payment.amount, dec!(92233720368547758.07));
    }

    #[tokio::test]
    async fn create_payment_replays_idempotency_key() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let mut req = payment_req(&hostel, dec!(1200));
        req.idempotency_key = Some("rent-2026-03".into());

        let (first, created) = services
            .payments
            .create_payment(&admin, req.clone())
            .await
            .unwrap();
        let (second, replayed_created) = services
            .payments
            .create_payment(&admin, req)
            .await
            .unwrap();

        assert!(created);
        assert!(!replayed_created);
        assert_eq!(first.id, second.id);
        let all = services
            .payments
            .list_payments(&admin, PaymentListQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn create_payment_rejects_foreign_currency() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let mut req = payment_req(&hostel, dec!(100));
        req.currency = Some(Currency::USD);
        let err = services
            .payments
            .create_payment(&admin, req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn failed_payment_is_terminal() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let (payment, _) = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(500)))
            .await
            .unwrap();

        let failed = services
            .payments
            .update_status(
                &admin,
                payment.id,
                UpdatePaymentStatusRequest {
                    status: PaymentStatus::Failed,
                    gateway_order_id: None,
                    gateway_payment_id: None,
                    transaction_reference: None,
                    failure_reason: Some("Card declined".into()),
                    paid_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);

        let err = services
            .payments
            .update_status(
                &admin,
                payment.id,
                UpdatePaymentStatusRequest {
                    status: PaymentStatus::Completed,
                    gateway_order_id: None,
                    gateway_payment_id: None,
                    transaction_reference: Some("late".into()),
                    failure_reason: None,
                    paid_at: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn overdue_payments_sorted_by_age() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        for due in [date(2026, 3, 5), date(2026, 3, 1), date(2026, 3, 20)] {
            let mut req = payment_req(&hostel, dec!(1000));
            req.due_date = Some(due);
            services.payments.create_payment(&admin, req).await.unwrap();
        }

        let overdue = services
            .payments
            .list_overdue(&admin, hostel.id, date(2026, 3, 11))
            .await
            .unwrap();

        let days: Vec<i64> = overdue.iter().map(|o| o.days_overdue).collect();
        assert_eq!(days, vec![10, 6]);

        let report = services
            .reports
            .overdue_report(&admin, hostel.id, date(2026, 3, 11))
            .await
            .unwrap();
        assert_eq!(report.count, 2);
        assert_eq!(report.total_amount, dec!(2000));
    }

    // ── bookings & advance ──────────────────────────────────────────────────

    #[tokio::test]
    async fn booking_total_is_derived_and_checked() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let booking = services
            .bookings
            .create_booking(&admin, booking_req(&hostel))
            .await
            .unwrap();
        assert_eq!(booking.total_amount, dec!(51000));

        let mut wrong = booking_req(&hostel);
        wrong.total_amount = Some(dec!(50000));
        let err = services
            .bookings
            .create_booking(&admin, wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn booking_with_oversized_rent_is_rejected() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let mut huge = booking_req(&hostel);
        huge.quoted_rent_monthly = Decimal::MAX;
        let err = services
            .bookings
            .create_booking(&admin, huge)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // the rent fits on its own but the stay total does not
        let mut long_stay = booking_req(&hostel);
        long_stay.quoted_rent_monthly = dec!(10000000000000000);
        long_stay.stay_duration_months = 12;
        let err = services
            .bookings
            .create_booking(&admin, long_stay)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let mut quoted = booking_req(&hostel);
        quoted.total_amount = Some(Decimal::MAX);
        let err = services
            .bookings
            .create_booking(&admin, quoted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn paid_advance_confirms_booking() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let booking = services
            .bookings
            .create_booking(&admin, booking_req(&hostel))
            .await
            .unwrap();

        let (advance, created) = services
            .requests
            .request_booking_advance(&admin, booking.id, RequestAdvanceRequest::default())
            .await
            .unwrap();
        assert!(created);
        assert_eq!(advance.amount, dec!(5000));
        assert_eq!(advance.due_date, Some(booking.check_in_date));
        assert_eq!(advance.method, PaymentMethod::Upi);

        // asking again returns the same open advance
        let (again, created_again) = services
            .requests
            .request_booking_advance(&admin, booking.id, RequestAdvanceRequest::default())
            .await
            .unwrap();
        assert!(!created_again);
        assert_eq!(again.id, advance.id);

        services
            .payments
            .update_status(
                &admin,
                advance.id,
                UpdatePaymentStatusRequest {
                    status: PaymentStatus::Completed,
                    gateway_order_id: None,
                    gateway_payment_id: None,
                    transaction_reference: Some("UTR99".into()),
                    failure_reason: None,
                    paid_at: None,
                },
            )
            .await
            .unwrap();

        let booking = services.bookings.get_booking(&admin, booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let err = services.bookings.approve(&admin, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn advance_uses_requested_method() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let booking = services
            .bookings
            .create_booking(&admin, booking_req(&hostel))
            .await
            .unwrap();

        let (advance, _) = services
            .requests
            .request_booking_advance(
                &admin,
                booking.id,
                RequestAdvanceRequest {
                    due_date: Some(date(2026, 6, 20)),
                    method: Some(PaymentMethod::BankTransfer),
                },
            )
            .await
            .unwrap();
        assert_eq!(advance.method, PaymentMethod::BankTransfer);
        assert_eq!(advance.due_date, Some(date(2026, 6, 20)));
    }

    #[tokio::test]
    async fn cancelled_booking_is_terminal() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let booking = services
            .bookings
            .create_booking(&admin, booking_req(&hostel))
            .await
            .unwrap();

        services.bookings.cancel(&admin, booking.id).await.unwrap();
        let err = services.bookings.confirm(&admin, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    // ── gateway ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn checkout_then_verify_completes_payment() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let (payment, _) = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(8500)))
            .await
            .unwrap();

        let checkout = services
            .requests
            .initiate_online_payment(&admin, payment.id)
            .await
            .unwrap();
        assert_eq!(checkout.order.amount_minor, 850000);

        // reopening the checkout hands back the same order
        let reopened = services
            .requests
            .initiate_online_payment(&admin, payment.id)
            .await
            .unwrap();
        assert_eq!(reopened.order.order_id, checkout.order.order_id);

        let signer = SandboxGateway::default();
        let bad = services
            .gateway
            .verify_checkout(
                &admin,
                VerifyCheckoutRequest {
                    order_id: checkout.order.order_id.clone(),
                    gateway_payment_id: "pay_test1".into(),
                    signature: "00".repeat(32),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(bad, AppError::BadRequest(_)));

        let paid = services
            .gateway
            .verify_checkout(
                &admin,
                VerifyCheckoutRequest {
                    order_id: checkout.order.order_id.clone(),
                    gateway_payment_id: "pay_test1".into(),
                    signature: signer.sign_checkout(&checkout.order.order_id, "pay_test1"),
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Completed);
        assert_eq!(paid.method, PaymentMethod::Gateway);
        assert!(paid.receipt_number.is_some());
    }

    #[tokio::test]
    async fn gateway_webhook_captures_once() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let (payment, _) = services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(250)))
            .await
            .unwrap();
        let checkout = services
            .requests
            .initiate_online_payment(&admin, payment.id)
            .await
            .unwrap();

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "order_id": checkout.order.order_id,
                "payment_id": "pay_hook1",
                "amount": 25000,
                "currency": "INR"
            }
        }))
        .unwrap();
        let signature = SandboxGateway::default().sign_webhook(&body);

        let err = services
            .gateway
            .handle_webhook(&body, "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let first = services.gateway.handle_webhook(&body, &signature).await.unwrap();
        let second = services.gateway.handle_webhook(&body, &signature).await.unwrap();
        assert_eq!(first.status, "processed");
        assert_eq!(second.status, "duplicate");

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.gateway_payment_id.as_deref(), Some("pay_hook1"));
    }

    #[tokio::test]
    async fn gateway_webhook_ignores_unknown_events() {
        let (services, _admin) = setup().await;
        let body = br#"{"event":"settlement.processed","payload":{}}"#;
        let signature = SandboxGateway::default().sign_webhook(body);

        let ack = services.gateway.handle_webhook(body, &signature).await.unwrap();
        assert_eq!(ack.status, "ignored");
    }

    async fn open_checkout(
        services: &TestServices,
        admin: &Principal,
        amount: Decimal,
    ) -> (Payment, String) {
        let hostel = hostel(services, admin).await;
        let (payment, _) = services
            .payments
            .create_payment(admin, payment_req(&hostel, amount))
            .await
            .unwrap();
        let checkout = services
            .requests
            .initiate_online_payment(admin, payment.id)
            .await
            .unwrap();
        (payment, checkout.order.order_id)
    }

    fn signed(body: serde_json::Value) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(&body).unwrap();
        let signature = SandboxGateway::default().sign_webhook(&body);
        (body, signature)
    }

    #[tokio::test]
    async fn gateway_webhook_fails_payment() {
        let (services, admin) = setup().await;
        let (payment, order_id) = open_checkout(&services, &admin, dec!(250)).await;

        let (body, signature) = signed(serde_json::json!({
            "event": "payment.failed",
            "payload": {
                "order_id": order_id,
                "payment_id": "pay_declined",
                "error_description": "Card declined by issuer"
            }
        }));
        let first = services.gateway.handle_webhook(&body, &signature).await.unwrap();
        let second = services.gateway.handle_webhook(&body, &signature).await.unwrap();
        assert_eq!(first.status, "processed");
        assert_eq!(second.status, "duplicate");

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("Card declined by issuer"));
        assert_eq!(stored.gateway_payment_id.as_deref(), Some("pay_declined"));
        assert!(stored.failed_at.is_some());
    }

    #[tokio::test]
    async fn gateway_webhook_rejects_wrong_captured_amount() {
        let (services, admin) = setup().await;
        let (payment, order_id) = open_checkout(&services, &admin, dec!(250)).await;

        let (body, signature) = signed(serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "order_id": order_id,
                "payment_id": "pay_short",
                "amount": 2500,
                "currency": "INR"
            }
        }));
        let err = services.gateway.handle_webhook(&body, &signature).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Processing);
        assert!(stored.gateway_payment_id.is_none());
    }

    #[tokio::test]
    async fn gateway_webhook_rejects_wrong_captured_currency() {
        let (services, admin) = setup().await;
        let (payment, order_id) = open_checkout(&services, &admin, dec!(250)).await;

        // right number of minor units, wrong currency
        let (body, signature) = signed(serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "order_id": order_id,
                "payment_id": "pay_usd",
                "amount": 25000,
                "currency": "USD"
            }
        }));
        let err = services.gateway.handle_webhook(&body, &signature).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let (body, signature) = signed(serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "order_id": order_id,
                "payment_id": "pay_usd",
                "amount": 25000,
                "currency": "ZZZ"
            }
        }));
        let err = services.gateway.handle_webhook(&body, &signature).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Processing);
    }

    // ── refunds, ledger & summary ───────────────────────────────────────────

    #[tokio::test]
    async fn refunds_are_cumulative_and_flip_to_refunded() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let payment = manual(&services, &admin, &hostel, dec!(1000)).await;

        let first = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(600),
                    reason: "Partial deposit return".into(),
                },
            )
            .await
            .unwrap();

        // the pending 600 is reserved
        let err = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(500),
                    reason: "Too much".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let processed = services.refunds.process_refund(&admin, first.id).await.unwrap();
        assert_eq!(processed.refund.status, RefundStatus::Processed);
        assert_eq!(processed.payment.refunded_amount, dec!(600));
        assert_eq!(processed.payment.status, PaymentStatus::Completed);

        let rest = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(400),
                    reason: "Remainder".into(),
                },
            )
            .await
            .unwrap();
        let done = services.refunds.process_refund(&admin, rest.id).await.unwrap();
        assert_eq!(done.payment.status, PaymentStatus::Refunded);

        let again = services.refunds.process_refund(&admin, rest.id).await.unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejected_refund_releases_reserved_amount() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let payment = manual(&services, &admin, &hostel, dec!(1000)).await;
        let refund = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(1000),
                    reason: "Left before check-in".into(),
                },
            )
            .await
            .unwrap();

        let err = services
            .refunds
            .reject_refund(&admin, refund.id, RejectRefundRequest { reason: "  ".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let rejected = services
            .refunds
            .reject_refund(
                &admin,
                refund.id,
                RejectRefundRequest {
                    reason: "Stay was used".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, RefundStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Stay was used"));

        let again = services
            .refunds
            .reject_refund(
                &admin,
                refund.id,
                RejectRefundRequest {
                    reason: "Twice".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
        let process = services.refunds.process_refund(&admin, refund.id).await.unwrap_err();
        assert!(matches!(process, AppError::Conflict(_)));

        // the full amount is refundable again
        services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(1000),
                    reason: "Retry".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_processing_refunds_through_gateway_once() {
        let (services, admin, refunds) = slow_gateway_setup(false).await;
        let payment = paid_online(&services, &admin, dec!(1000)).await;
        let refund = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(400),
                    reason: "Room downgrade".into(),
                },
            )
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            services.refunds.process_refund(&admin, refund.id),
            services.refunds.process_refund(&admin, refund.id),
        );

        assert_eq!(refunds.load(Ordering::SeqCst), 1);
        let (done, lost) = match (first, second) {
            (Ok(done), Err(lost)) | (Err(lost), Ok(done)) => (done, lost),
            other => panic!("expected exactly one success, got {other:?}"),
        };
        assert!(matches!(lost, AppError::Conflict(_)));
        assert_eq!(done.refund.status, RefundStatus::Processed);
        assert!(done.refund.gateway_refund_id.is_some());
        assert_eq!(done.payment.refunded_amount, dec!(400));

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.refunded_amount, dec!(400));
    }

    #[tokio::test]
    async fn failed_gateway_refund_can_be_retried() {
        let (services, admin, refunds) = slow_gateway_setup(true).await;
        let payment = paid_online(&services, &admin, dec!(1000)).await;
        let refund = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(1000),
                    reason: "Booking cancelled".into(),
                },
            )
            .await
            .unwrap();

        let err = services.refunds.process_refund(&admin, refund.id).await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
        assert_eq!(refunds.load(Ordering::SeqCst), 1);

        // the claim is handed back, so the refund is pending and still reserved
        let listed = services.refunds.list_refunds(&admin, payment.id).await.unwrap();
        assert_eq!(listed[0].status, RefundStatus::Pending);
        let err = services.refunds.process_refund(&admin, refund.id).await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
        assert_eq!(refunds.load(Ordering::SeqCst), 2);

        let stored = services.payments.get_payment(&admin, payment.id).await.unwrap();
        assert_eq!(stored.refunded_amount, dec!(0));
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn ledger_and_summary_reflect_refunds() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let payment = manual(&services, &admin, &hostel, dec!(1000)).await;
        services
            .payments
            .create_payment(&admin, payment_req(&hostel, dec!(1000)))
            .await
            .unwrap();

        let refund = services
            .refunds
            .request_refund(
                &admin,
                payment.id,
                CreateRefundRequest {
                    amount: dec!(200),
                    reason: "Damage waiver".into(),
                },
            )
            .await
            .unwrap();
        services.refunds.process_refund(&admin, refund.id).await.unwrap();

        let ledger = services
            .ledger
            .ledger(&admin, hostel.id, LedgerQuery::default())
            .await
            .unwrap();
        assert_eq!(ledger.entries.len(), 2);
        assert_eq!(ledger.total_debits, dec!(1000));
        assert_eq!(ledger.total_credits, dec!(200));
        assert_eq!(ledger.closing_balance, dec!(800));
        assert!(ledger.is_balanced());

        let summary = services
            .reports
            .summary(&admin, hostel.id, SummaryQuery::default())
            .await
            .unwrap();
        assert_eq!(summary.total_collected, dec!(1000));
        assert_eq!(summary.total_refunded, dec!(200));
        assert_eq!(summary.net_collected, dec!(800));
        assert_eq!(summary.pending_amount, dec!(1000));
        assert_eq!(summary.collection_rate, dec!(50));
    }

    #[tokio::test]
    async fn ledger_rejects_inverted_window() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;

        let err = services
            .ledger
            .ledger(
                &admin,
                hostel.id,
                LedgerQuery {
                    from: Some(date(2026, 4, 1)),
                    to: Some(date(2026, 3, 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    // ── schedules & reminders ───────────────────────────────────────────────

    #[tokio::test]
    async fn schedule_generation_is_idempotent() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let schedule = services
            .schedules
            .create_schedule(
                &admin,
                CreateScheduleRequest {
                    hostel_id: hostel.id,
                    payer_id: Uuid::new_v4(),
                    student_id: None,
                    booking_id: None,
                    payment_type: PaymentType::Rent,
                    amount: dec!(8500),
                    method: PaymentMethod::BankTransfer,
                    frequency: Frequency::Monthly,
                    start_date: date(2026, 1, 31),
                    end_date: None,
                    description: None,
                },
            )
            .await
            .unwrap();

        let run = services
            .schedules
            .generate_due_payments(date(2026, 3, 31), Some(hostel.id))
            .await
            .unwrap();
        let dues: Vec<_> = run.payments.iter().filter_map(|p| p.due_date).collect();
        assert_eq!(dues, vec![date(2026, 1, 31), date(2026, 2, 28), date(2026, 3, 31)]);
        assert!(run.payments.iter().all(|p| p.method == PaymentMethod::BankTransfer));

        let rerun = services
            .schedules
            .generate_due_payments(date(2026, 3, 31), None)
            .await
            .unwrap();
        assert!(rerun.payments.is_empty());

        let stored = services.schedules.get_schedule(&admin, schedule.id).await.unwrap();
        assert_eq!(stored.installments_generated, 3);
        assert_eq!(stored.next_due_date, date(2026, 4, 30));
    }

    #[tokio::test]
    async fn reminders_follow_policy() {
        let (services, admin) = setup().await;
        let hostel = hostel(&services, &admin).await;
        let mut req = payment_req(&hostel, dec!(700));
        req.due_date = Some(date(2026, 3, 10));
        let (payment, _) = services.payments.create_payment(&admin, req).await.unwrap();

        let kinds = |r: hostel_types::DispatchRemindersResponse| -> Vec<ReminderKind> {
            r.reminders.into_iter().map(|r| r.kind).collect()
        };
        let reminders = &services.reminders;

        assert_eq!(kinds(reminders.dispatch(date(2026, 3, 8), None).await.unwrap()), vec![ReminderKind::Upcoming]);
        assert!(kinds(reminders.dispatch(date(2026, 3, 8), None).await.unwrap()).is_empty());
        assert_eq!(kinds(reminders.dispatch(date(2026, 3, 10), None).await.unwrap()), vec![ReminderKind::DueToday]);
        assert_eq!(kinds(reminders.dispatch(date(2026, 3, 11), None).await.unwrap()), vec![ReminderKind::Overdue]);
        assert!(kinds(reminders.dispatch(date(2026, 3, 15), None).await.unwrap()).is_empty());
        assert_eq!(kinds(reminders.dispatch(date(2026, 3, 18), None).await.unwrap()), vec![ReminderKind::Overdue]);

        let history = reminders.list_for_payment(&admin, payment.id).await.unwrap();
        assert_eq!(history.len(), 4);
    }

    // ── access ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn bootstrap_only_once() {
        let (services, _admin) = setup().await;
        let err = services
            .access
            .bootstrap(BootstrapRequest { name: "again".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn scoped_key_is_confined_to_its_hostel() {
        let (services, admin) = setup().await;
        let own = hostel(&services, &admin).await;
        let other = hostel(&services, &admin).await;

        let key = services
            .access
            .create_api_key(
                &admin,
                CreateApiKeyRequest {
                    name: "front-desk".into(),
                    hostel_id: Some(own.id),
                },
            )
            .await
            .unwrap();
        let scoped = services
            .access
            .authenticate(&key.api_key)
            .await
            .unwrap()
            .unwrap();

        assert!(services.hostels.get_hostel(&scoped, own.id).await.is_ok());
        let err = services.hostels.get_hostel(&scoped, other.id).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let visible = services.hostels.list_hostels(&scoped).await.unwrap();
        assert_eq!(visible.len(), 1);

        let err = services
            .access
            .list_api_keys(&scoped)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        assert!(services.access.authenticate("sk_not_a_key").await.unwrap().is_none());
        assert_eq!(services.repo().count_api_keys().await.unwrap(), 2);
    }
}
