//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use hostel_types::domain::{NewBooking, NewPayment, NewSchedule};
    use hostel_types::{
        ApiKey, Booking, BookingStatus, Currency, DomainEvent, EventType, Frequency, Hostel,
        HostelRepository, Payment, PaymentListQuery, PaymentMethod, PaymentSchedule,
        PaymentStatus, PaymentType, Refund, RefundStatus, Reminder, ReminderKind, RepoError,
        UnitOfWork, WebhookEndpoint,
    };

    use crate::SqliteRepo;
    use crate::security::{generate_api_key, hash_api_key};

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn hostel(repo: &SqliteRepo) -> Hostel {
        let hostel = Hostel::new("Sunrise Residency".into(), Currency::INR).unwrap();
        repo.create_hostel(&hostel).await.unwrap();
        hostel
    }

    fn payment(hostel: &Hostel, amount: rust_decimal::Decimal, due: Option<NaiveDate>) -> Payment {
        Payment::new(
            NewPayment {
                hostel_id: hostel.id,
                payer_id: Uuid::new_v4(),
                student_id: Some(Uuid::new_v4()),
                booking_id: None,
                schedule_id: None,
                payment_type: PaymentType::Rent,
                amount,
                method: PaymentMethod::Upi,
                due_date: due,
                description: Some("March rent".into()),
                idempotency_key: None,
            },
            hostel.currency,
        )
        .unwrap()
    }

    async fn insert(repo: &SqliteRepo, payment: &Payment) {
        let mut uow = UnitOfWork::new();
        uow.insert_payment(payment.clone());
        repo.commit(uow).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_list_hostels() {
        let repo = setup_repo().await;
        let created = hostel(&repo).await;

        let fetched = repo.get_hostel(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Sunrise Residency");
        assert_eq!(fetched.currency, Currency::INR);
        assert_eq!(repo.list_hostels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_round_trip_preserves_amounts_and_dates() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;
        let payment = payment(&hostel, dec!(8500.45), Some(date(2026, 3, 5)));
        insert(&repo, &payment).await;

        let fetched = repo.get_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(fetched.amount, dec!(8500.45));
        assert_eq!(fetched.refunded_amount, dec!(0));
        assert_eq!(fetched.due_date, Some(date(2026, 3, 5)));
        assert_eq!(fetched.status, PaymentStatus::Pending);
        assert_eq!(fetched.payment_type, PaymentType::Rent);
        assert_eq!(fetched.description.as_deref(), Some("March rent"));
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn test_get_payment_not_found() {
        let repo = setup_repo().await;
        let result = repo
            .get_payment(hostel_types::PaymentId::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_is_conflict() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;

        let mut first = payment(&hostel, dec!(100), None);
        first.idempotency_key = Some("rent-2026-03".into());
        insert(&repo, &first).await;

        let mut second = payment(&hostel, dec!(100), None);
        second.idempotency_key = Some("rent-2026-03".into());
        let mut uow = UnitOfWork::new();
        uow.insert_payment(second);
        assert!(matches!(repo.commit(uow).await, Err(RepoError::Conflict(_))));

        let found = repo
            .find_payment_by_idempotency_key(hostel.id, "rent-2026-03")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_versioned_update_detects_stale_write() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;
        let payment = payment(&hostel, dec!(2500), None);
        insert(&repo, &payment).await;

        let mut first = payment.clone();
        first.complete(Some("UTR123".into()), None, Utc::now()).unwrap();
        let mut uow = UnitOfWork::new();
        uow.update_payment(first);
        repo.commit(uow).await.unwrap();

        // Same starting version, so this write lost the race.
        let mut second = payment.clone();
        second.fail("Card declined".into(), Utc::now()).unwrap();
        let mut uow = UnitOfWork::new();
        uow.update_payment(second);
        assert!(matches!(repo.commit(uow).await, Err(RepoError::Conflict(_))));

        let stored = repo.get_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.version, 1);
        assert!(stored.receipt_number.unwrap().starts_with("RCP-"));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_everything() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;
        let existing = payment(&hostel, dec!(100), None);
        insert(&repo, &existing).await;

        let fresh = payment(&hostel, dec!(200), None);
        let mut stale = existing.clone();
        stale.version = 7;
        stale.mark_processing("order_x".into()).unwrap();

        let mut uow = UnitOfWork::new();
        uow.insert_payment(fresh.clone()).update_payment(stale);
        assert!(repo.commit(uow).await.is_err());

        assert!(repo.get_payment(fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_payments_filters() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;
        let other = Hostel::new("Other".into(), Currency::INR).unwrap();
        repo.create_hostel(&other).await.unwrap();

        let march = payment(&hostel, dec!(100), Some(date(2026, 3, 1)));
        let april = payment(&hostel, dec!(100), Some(date(2026, 4, 1)));
        let elsewhere = payment(&other, dec!(100), Some(date(2026, 3, 1)));
        for p in [&march, &april, &elsewhere] {
            insert(&repo, p).await;
        }

        let by_hostel = repo
            .list_payments(&PaymentListQuery {
                hostel_id: Some(hostel.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_hostel.len(), 2);
        assert_eq!(by_hostel[0].id, march.id);

        let in_april = repo
            .list_payments(&PaymentListQuery {
                hostel_id: Some(hostel.id),
                due_from: Some(date(2026, 3, 15)),
                due_to: Some(date(2026, 4, 30)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_april.len(), 1);
        assert_eq!(in_april[0].id, april.id);

        let by_student = repo
            .list_payments(&PaymentListQuery {
                student_id: march.student_id,
                status: Some(PaymentStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_student.len(), 1);
    }

    #[tokio::test]
    async fn test_open_payments_exclude_completed_and_undated() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;

        let open = payment(&hostel, dec!(100), Some(date(2026, 3, 1)));
        let undated = payment(&hostel, dec!(100), None);
        let mut paid = payment(&hostel, dec!(100), Some(date(2026, 3, 1)));
        paid.complete(None, None, Utc::now()).unwrap();
        for p in [&open, &undated, &paid] {
            insert(&repo, p).await;
        }

        let listed = repo.list_open_payments(Some(hostel.id)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);
    }

    #[tokio::test]
    async fn test_booking_and_refund_updates() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;

        let booking = Booking::new(
            NewBooking {
                hostel_id: hostel.id,
                student_id: Uuid::new_v4(),
                room_type: Some("double".into()),
                check_in_date: date(2026, 6, 1),
                stay_duration_months: 6,
                quoted_rent_monthly: dec!(8000),
                security_deposit: dec!(5000),
                advance_amount: dec!(8000),
                total_amount: None,
            },
            hostel.currency,
        )
        .unwrap();
        let mut paid = payment(&hostel, dec!(1000), None);
        paid.complete(None, None, Utc::now()).unwrap();
        let refund = Refund::request(&paid, dec!(400), "Overcharged".into(), dec!(0)).unwrap();

        let mut uow = UnitOfWork::new();
        uow.insert_booking(booking.clone())
            .insert_payment(paid.clone())
            .insert_refund(refund.clone());
        repo.commit(uow).await.unwrap();

        let stored = repo.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount, dec!(48000));
        assert_eq!(stored.status, BookingStatus::Pending);

        let mut approved = stored.clone();
        approved.transition(BookingStatus::Approved).unwrap();
        let mut processed = refund.clone();
        processed
            .mark_processed(Some("rfnd_1".into()), Utc::now())
            .unwrap();
        let mut uow = UnitOfWork::new();
        uow.update_booking(approved).update_refund(processed.clone());
        repo.commit(uow).await.unwrap();

        assert_eq!(
            repo.get_booking(booking.id).await.unwrap().unwrap().status,
            BookingStatus::Approved
        );
        let fetched = repo.find_refund_by_gateway_id("rfnd_1").await.unwrap().unwrap();
        assert_eq!(fetched.status, RefundStatus::Processed);
        assert_eq!(fetched.amount, dec!(400));

        // A stale copy of the refund cannot overwrite the processed one.
        let mut again = refund.clone();
        again.reject("late".into()).unwrap();
        let mut uow = UnitOfWork::new();
        uow.update_refund(again);
        assert!(matches!(repo.commit(uow).await, Err(RepoError::Conflict(_))));

        assert_eq!(repo.list_refunds_for_payment(paid.id).await.unwrap().len(), 1);
        assert_eq!(repo.list_bookings(hostel.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_due_schedules_and_reminders() {
        let repo = setup_repo().await;
        let hostel = hostel(&repo).await;

        let schedule = PaymentSchedule::new(
            NewSchedule {
                hostel_id: hostel.id,
                payer_id: Uuid::new_v4(),
                student_id: None,
                booking_id: None,
                payment_type: PaymentType::Rent,
                amount: dec!(7000),
                method: PaymentMethod::Cash,
                frequency: Frequency::Monthly,
                start_date: date(2026, 1, 31),
                end_date: None,
                description: None,
            },
            hostel.currency,
        )
        .unwrap();
        let due = payment(&hostel, dec!(100), Some(date(2026, 3, 1)));
        let reminder = Reminder::new(&due, ReminderKind::Overdue, date(2026, 3, 2));

        let mut uow = UnitOfWork::new();
        uow.insert_schedule(schedule.clone())
            .insert_payment(due.clone())
            .insert_reminder(reminder);
        repo.commit(uow).await.unwrap();

        assert!(
            repo.list_due_schedules(date(2026, 1, 30), None)
                .await
                .unwrap()
                .is_empty()
        );
        let due_now = repo
            .list_due_schedules(date(2026, 2, 1), Some(hostel.id))
            .await
            .unwrap();
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].frequency, Frequency::Monthly);

        let reminders = repo.list_reminders_for_payment(due.id).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::Overdue);
    }

    #[tokio::test]
    async fn test_api_key_lifecycle() {
        let repo = setup_repo().await;
        assert_eq!(repo.count_api_keys().await.unwrap(), 0);

        let raw = generate_api_key();
        let key = ApiKey::new("admin".into(), hash_api_key(&raw), None);
        repo.create_api_key(&key).await.unwrap();
        assert_eq!(repo.count_api_keys().await.unwrap(), 1);

        let found = repo
            .verify_api_key_hash(&hash_api_key(&raw))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, key.id);
        assert!(found.last_used_at.is_some());
        assert!(
            repo.verify_api_key_hash(&hash_api_key("sk_wrong"))
                .await
                .unwrap()
                .is_none()
        );

        assert!(repo.delete_api_key(key.id).await.unwrap());
        assert!(!repo.delete_api_key(key.id).await.unwrap());
        assert!(
            repo.verify_api_key_hash(&hash_api_key(&raw))
                .await
                .unwrap()
                .is_none()
        );
        assert!(repo.list_api_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_fan_out_to_subscribed_endpoints() {
        let repo = setup_repo().await;
        let all = WebhookEndpoint::new(
            "https://example.com/all".into(),
            "whsec_aaaaaaaaaaaaaaaa".into(),
            vec![],
        )
        .unwrap();
        let refunds_only = WebhookEndpoint::new(
            "https://example.com/refunds".into(),
            "whsec_bbbbbbbbbbbbbbbb".into(),
            vec![EventType::RefundProcessed],
        )
        .unwrap();
        repo.create_webhook_endpoint(&all).await.unwrap();
        repo.create_webhook_endpoint(&refunds_only).await.unwrap();
        assert_eq!(repo.list_webhook_endpoints().await.unwrap().len(), 2);

        let mut uow = UnitOfWork::new();
        uow.emit(DomainEvent::new(EventType::PaymentCreated, &serde_json::json!({"n": 1})).unwrap())
            .emit(DomainEvent::new(EventType::RefundProcessed, &serde_json::json!({"n": 2})).unwrap());
        repo.commit(uow).await.unwrap();

        let pending = repo.get_pending_webhooks(10).await.unwrap();
        assert_eq!(pending.len(), 3);
        assert!(
            pending
                .iter()
                .filter(|(_, endpoint)| endpoint.id == refunds_only.id)
                .all(|(event, _)| event.event_type == EventType::RefundProcessed)
        );

        let (event, _) = &pending[0];
        repo.update_webhook_status(event.id, hostel_types::WebhookStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(repo.get_pending_webhooks(10).await.unwrap().len(), 2);
    }
}
