//! Integration tests for the reconciliation workflows.
//!
//! Tests: Engine → Store transaction → ledgers + stock → Notifier
//!
//! Verifies:
//! - Carts split into one reservation plus pending offers, all-or-nothing
//! - Offer acceptance reserves stock and cancels competing offers atomically
//! - Terminal states refuse transitions without side effects
//! - Notification failures never undo committed work
//! - Store failures mid-transaction leave no partial writes

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use storefront_core::{Customer, DeviceId, Money, OfferId, ReservationId};
    use storefront_inventory::{Device, DeviceFilter, DeviceSpec};
    use storefront_offers::{
        COMPETING_OFFER_ACCEPTED_REASON, DEFAULT_REJECTION_REASON, Offer, OfferDecision,
        OfferFloor, OfferStatus,
    };
    use storefront_reservations::{
        DEFAULT_CANCELLATION_REASON, Reservation, ReservationCode, ReservationStatus,
    };

    use crate::notify::{
        Notifier, NotifyError, OfferDecisionNotice, RecordingNotifier, ReservationConfirmation,
        SentNotification,
    };
    use crate::reconciliation::{
        CartLine, CartSubmission, OfferAction, ReconciliationEngine, ReconciliationError,
        ReservationStatusChange,
    };
    use crate::store::{InMemoryStore, Store, StoreError, StoreTransaction};

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send_reservation_confirmation(
            &self,
            _confirmation: &ReservationConfirmation,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp unreachable".to_string()))
        }

        async fn send_offer_decision(
            &self,
            _notice: &OfferDecisionNotice,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp unreachable".to_string()))
        }
    }

    /// Which transactional write the wrapped store refuses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FailAt {
        InsertReservation,
        DecrementStock,
    }

    /// Delegates to an [`InMemoryStore`] but fails one write with a database error.
    struct FailingStore {
        inner: InMemoryStore,
        fail_at: FailAt,
    }

    struct FailingTransaction {
        inner: Box<dyn StoreTransaction>,
        fail_at: FailAt,
    }

    impl FailingTransaction {
        fn check(&self, op: FailAt) -> Result<(), StoreError> {
            if self.fail_at == op {
                return Err(StoreError::Database("connection reset by peer".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
            Ok(Box::new(FailingTransaction {
                inner: self.inner.begin().await?,
                fail_at: self.fail_at,
            }))
        }

        async fn device(&self, id: &DeviceId) -> Result<Option<Device>, StoreError> {
            self.inner.device(id).await
        }

        async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
            self.inner.devices(filter).await
        }

        async fn offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
            self.inner.offer(id).await
        }

        async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, StoreError> {
            self.inner.offers(status).await
        }

        async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
            self.inner.reservation(id).await
        }

        async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
            self.inner.reservations().await
        }

        async fn reservation_by_offer(
            &self,
            offer_id: OfferId,
        ) -> Result<Option<Reservation>, StoreError> {
            self.inner.reservation_by_offer(offer_id).await
        }
    }

    #[async_trait]
    impl StoreTransaction for FailingTransaction {
        async fn device_for_update(&mut self, id: &DeviceId) -> Result<Device, StoreError> {
            self.inner.device_for_update(id).await
        }

        async fn upsert_device(&mut self, device: &Device) -> Result<(), StoreError> {
            self.inner.upsert_device(device).await
        }

        async fn decrement_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
            self.check(FailAt::DecrementStock)?;
            self.inner.decrement_stock(id, quantity).await
        }

        async fn increment_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
            self.inner.increment_stock(id, quantity).await
        }

        async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
            self.inner.insert_offer(offer).await
        }

        async fn offer_for_update(&mut self, id: OfferId) -> Result<Offer, StoreError> {
            self.inner.offer_for_update(id).await
        }

        async fn update_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
            self.inner.update_offer(offer).await
        }

        async fn pending_offers_for_device(
            &mut self,
            device_id: &DeviceId,
            exclude: OfferId,
        ) -> Result<Vec<Offer>, StoreError> {
            self.inner.pending_offers_for_device(device_id, exclude).await
        }

        async fn reservation_code_exists(
            &mut self,
            code: &ReservationCode,
        ) -> Result<bool, StoreError> {
            self.inner.reservation_code_exists(code).await
        }

        async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
            self.check(FailAt::InsertReservation)?;
            self.inner.insert_reservation(reservation).await
        }

        async fn reservation_for_update(
            &mut self,
            id: ReservationId,
        ) -> Result<Reservation, StoreError> {
            self.inner.reservation_for_update(id).await
        }

        async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
            self.inner.update_reservation(reservation).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    fn device(id: &str, price: i64, stock: i64) -> Device {
        Device::create(
            did(id),
            DeviceSpec {
                name: format!("Device {id}"),
                brand: "Canon".to_string(),
                device_type: "Cámara".to_string(),
                description: String::new(),
                price: Money::from(price),
                stock,
                image: String::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn did(id: &str) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn customer() -> Customer {
        Customer::new("Ana Pérez", "ana@example.com", "5550101000", None).unwrap()
    }

    fn line(device_id: &str, quantity: i64, price: i64, original_price: i64) -> CartLine {
        CartLine {
            device_id: did(device_id),
            quantity,
            price: Money::from(price),
            original_price: Money::from(original_price),
        }
    }

    fn cart(lines: Vec<CartLine>) -> CartSubmission {
        CartSubmission {
            customer: customer(),
            lines,
        }
    }

    fn setup(devices: Vec<Device>) -> (ReconciliationEngine, InMemoryStore, RecordingNotifier) {
        let store = InMemoryStore::with_devices(devices);
        let notifier = RecordingNotifier::new();
        let engine = ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
            OfferFloor::default(),
        );
        (engine, store, notifier)
    }

    fn failing_setup(
        devices: Vec<Device>,
        fail_at: FailAt,
    ) -> (ReconciliationEngine, ReconciliationEngine, InMemoryStore, RecordingNotifier) {
        let (engine, store, notifier) = setup(devices);
        let failing = ReconciliationEngine::new(
            Arc::new(FailingStore {
                inner: store.clone(),
                fail_at,
            }),
            Arc::new(notifier.clone()),
            OfferFloor::default(),
        );
        (engine, failing, store, notifier)
    }

    async fn stock(store: &InMemoryStore, id: &str) -> i64 {
        store.device(&did(id)).await.unwrap().unwrap().stock()
    }

    fn is_valid_code(code: &str) -> bool {
        code.len() == 10 && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    async fn submit_offer(engine: &ReconciliationEngine, device_id: &str, qty: i64, price: i64) -> OfferId {
        let outcome = engine
            .submit_cart(cart(vec![line(device_id, qty, price, 100)]))
            .await
            .unwrap();
        outcome.offers[0].id
    }

    #[tokio::test]
    async fn storefront_scenario_list_price_then_offer_then_accept() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5)]);

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 2, 100, 100)]))
            .await
            .unwrap();
        let code = outcome.reservation_code().unwrap();
        assert!(is_valid_code(code.as_str()), "{code}");
        assert!(!outcome.has_offers());
        assert_eq!(stock(&store, "d1").await, 3);

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 1, 60, 100)]))
            .await
            .unwrap();
        assert!(outcome.reservation_code().is_none());
        assert_eq!(outcome.offer_count(), 1);
        assert_eq!(stock(&store, "d1").await, 3);

        let offer_id = outcome.offers[0].id;
        let accepted = engine.accept_offer(offer_id).await.unwrap();
        let reservation = accepted.reservation.unwrap();
        assert_eq!(reservation.offer_id, Some(offer_id));
        assert_eq!(reservation.total(), Money::from(60));
        assert_eq!(reservation.items()[0].original_price, Money::from(100));
        assert_eq!(accepted.offer.status(), OfferStatus::Accepted);
        assert_eq!(stock(&store, "d1").await, 2);
    }

    #[tokio::test]
    async fn list_price_cart_creates_one_reservation_and_one_confirmation() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5), device("d2", 35, 4)]);

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 2, 100, 100), line("d2", 3, 35, 35)]))
            .await
            .unwrap();

        let reservation = outcome.reservation.unwrap();
        let quantities: Vec<_> = reservation
            .items()
            .iter()
            .map(|i| (i.device_id.as_str().to_string(), i.quantity))
            .collect();
        assert_eq!(quantities, vec![("d1".to_string(), 2), ("d2".to_string(), 3)]);
        assert_eq!(reservation.total(), Money::from(305));
        assert_eq!(stock(&store, "d1").await, 3);
        assert_eq!(stock(&store, "d2").await, 1);
        assert_eq!(store.reservations().await.unwrap().len(), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            SentNotification::ReservationConfirmation(c) => {
                assert_eq!(c.code, reservation.code);
                assert_eq!(c.total, Money::from(305));
            }
            other => panic!("unexpected notification {other:?}"),
        }
    }

    #[tokio::test]
    async fn offer_only_cart_creates_pending_offers_and_touches_nothing_else() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5), device("d2", 100, 1)]);

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 1, 70, 100), line("d2", 1, 50, 100)]))
            .await
            .unwrap();

        assert!(outcome.reservation.is_none());
        assert_eq!(outcome.offer_count(), 2);
        assert!(outcome.offers.iter().all(|o| o.status() == OfferStatus::Pending));
        assert_eq!(store.offers(Some(OfferStatus::Pending)).await.unwrap().len(), 2);
        assert!(store.reservations().await.unwrap().is_empty());
        assert_eq!(stock(&store, "d1").await, 5);
        assert_eq!(stock(&store, "d2").await, 1);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn mixed_cart_is_split_and_only_list_part_is_confirmed() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5), device("d2", 100, 5)]);

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 1, 100, 100), line("d2", 2, 80, 100)]))
            .await
            .unwrap();

        let reservation = outcome.reservation.clone().unwrap();
        assert_eq!(reservation.items().len(), 1);
        assert_eq!(outcome.offer_count(), 1);
        assert_eq!(outcome.offers[0].quantity, 2);
        assert_eq!(stock(&store, "d1").await, 4);
        assert_eq!(stock(&store, "d2").await, 5);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn shortage_names_every_device_and_writes_nothing() {
        let (engine, store, notifier) = setup(vec![
            device("d1", 100, 1),
            device("d2", 100, 0),
            device("d3", 100, 9),
        ]);

        let err = engine
            .submit_cart(cart(vec![
                line("d1", 2, 100, 100),
                line("d3", 1, 100, 100),
                line("d2", 1, 60, 100),
            ]))
            .await
            .unwrap_err();

        match err {
            ReconciliationError::InsufficientStock(shortages) => {
                let mut names: Vec<_> = shortages
                    .iter()
                    .map(|s| (s.device_id.as_str().to_string(), s.requested, s.available))
                    .collect();
                names.sort();
                assert_eq!(names, vec![("d1".to_string(), 2, 1), ("d2".to_string(), 1, 0)]);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert!(store.reservations().await.unwrap().is_empty());
        assert!(store.offers(None).await.unwrap().is_empty());
        assert_eq!(stock(&store, "d1").await, 1);
        assert_eq!(stock(&store, "d3").await, 9);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn list_lines_on_the_same_device_are_checked_together() {
        let (engine, store, _) = setup(vec![device("d1", 100, 3)]);

        let err = engine
            .submit_cart(cart(vec![line("d1", 2, 100, 100), line("d1", 2, 100, 100)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::InsufficientStock(s) if s[0].requested == 4));
        assert_eq!(stock(&store, "d1").await, 3);
    }

    #[tokio::test]
    async fn unknown_device_aborts_the_cart() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5)]);

        let err = engine
            .submit_cart(cart(vec![line("d1", 1, 60, 100), line("ghost", 1, 100, 100)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::DeviceNotFound(ids) if ids == ["ghost"]));
        assert!(store.offers(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_unknown_device_is_reported() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5)]);

        let err = engine
            .submit_cart(cart(vec![
                line("zeta", 1, 100, 100),
                line("d1", 1, 100, 100),
                line("alpha", 1, 70, 100),
            ]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconciliationError::DeviceNotFound(ids) if ids == ["alpha", "zeta"]
        ));
        assert_eq!(stock(&store, "d1").await, 5);
        assert!(store.reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_line_total_is_invalid_input() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5)]);
        let huge = Money::new(Decimal::from(40_000_000_000_000_000_000_000_000_000_i128));

        let err = engine
            .submit_cart(cart(vec![CartLine {
                device_id: did("d1"),
                quantity: 2,
                price: huge,
                original_price: huge,
            }]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::InvalidInput(_)), "{err:?}");
        assert_eq!(stock(&store, "d1").await, 5);
        assert!(store.reservations().await.unwrap().is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn oversized_cart_total_is_invalid_input() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5), device("d2", 100, 5)]);
        let max = Money::new(Decimal::MAX);
        let at_max = |id: &str| CartLine {
            device_id: did(id),
            quantity: 1,
            price: max,
            original_price: max,
        };

        let err = engine
            .submit_cart(cart(vec![at_max("d1"), at_max("d2")]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::InvalidInput(_)), "{err:?}");
        assert_eq!(stock(&store, "d1").await, 5);
        assert_eq!(stock(&store, "d2").await, 5);
    }

    #[tokio::test]
    async fn summed_quantities_that_overflow_are_invalid_input() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5)]);

        let err = engine
            .submit_cart(cart(vec![
                line("d1", i64::MAX, 1, 1),
                line("d1", i64::MAX, 1, 1),
            ]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::InvalidInput(_)), "{err:?}");
        assert_eq!(stock(&store, "d1").await, 5);
        assert!(store.reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_mid_cart_leaves_nothing_behind() {
        let (_, failing, store, notifier) = failing_setup(
            vec![device("d1", 100, 5), device("d2", 100, 5)],
            FailAt::InsertReservation,
        );

        let err = failing
            .submit_cart(cart(vec![line("d1", 2, 100, 100), line("d2", 1, 80, 100)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::TransactionFailure(_)), "{err:?}");
        assert!(store.offers(None).await.unwrap().is_empty());
        assert!(store.reservations().await.unwrap().is_empty());
        assert_eq!(stock(&store, "d1").await, 5);
        assert_eq!(stock(&store, "d2").await, 5);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_lines_are_rejected_before_any_write() {
        let (engine, store, _) = setup(vec![device("d1", 100, 5)]);

        for bad in [
            vec![],
            vec![line("d1", 0, 100, 100)],
            vec![line("d1", 1, 0, 100)],
            vec![line("d1", 1, 40, 100)],
        ] {
            let err = engine.submit_cart(cart(bad)).await.unwrap_err();
            assert!(matches!(err, ReconciliationError::InvalidInput(_)), "{err:?}");
        }
        assert!(store.offers(None).await.unwrap().is_empty());
        assert_eq!(stock(&store, "d1").await, 5);
    }

    #[tokio::test]
    async fn accepting_cancels_every_competing_pending_offer() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5), device("d2", 100, 5)]);

        let winner = submit_offer(&engine, "d1", 1, 90).await;
        let loser_a = submit_offer(&engine, "d1", 1, 70).await;
        let loser_b = submit_offer(&engine, "d1", 2, 60).await;
        let other_device = submit_offer(&engine, "d2", 1, 60).await;

        let outcome = engine.accept_offer(winner).await.unwrap();
        assert_eq!(outcome.cancelled_offers, 2);

        for id in [loser_a, loser_b] {
            let offer = store.offer(id).await.unwrap().unwrap();
            assert_eq!(offer.status(), OfferStatus::Cancelled);
            assert_eq!(offer.rejection_reason(), Some(COMPETING_OFFER_ACCEPTED_REASON));
        }
        let untouched = store.offer(other_device).await.unwrap().unwrap();
        assert_eq!(untouched.status(), OfferStatus::Pending);

        let linked = store.reservation_by_offer(winner).await.unwrap().unwrap();
        assert_eq!(Some(&linked.code), outcome.reservation.as_ref().map(|r| &r.code));
        assert_eq!(stock(&store, "d1").await, 4);

        match notifier.sent().last() {
            Some(SentNotification::OfferDecision(n)) => {
                assert_eq!(n.decision, OfferDecision::Accepted);
                assert_eq!(n.reservation_code.as_ref(), Some(&linked.code));
            }
            other => panic!("unexpected notification {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepting_without_enough_stock_leaves_offer_pending() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 3)]);
        let offer_id = submit_offer(&engine, "d1", 3, 80).await;
        engine
            .submit_cart(cart(vec![line("d1", 2, 100, 100)]))
            .await
            .unwrap();
        let sent_before = notifier.sent().len();

        let err = engine.accept_offer(offer_id).await.unwrap_err();

        assert!(matches!(&err, ReconciliationError::InsufficientStock(s) if s[0].available == 1));
        let offer = store.offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.status(), OfferStatus::Pending);
        assert!(store.reservation_by_offer(offer_id).await.unwrap().is_none());
        assert_eq!(stock(&store, "d1").await, 1);
        assert_eq!(notifier.sent().len(), sent_before);
    }

    #[tokio::test]
    async fn store_failure_mid_accept_keeps_every_offer_pending() {
        let (engine, failing, store, notifier) =
            failing_setup(vec![device("d1", 100, 5)], FailAt::DecrementStock);
        let offer_id = submit_offer(&engine, "d1", 2, 80).await;
        let competitor = submit_offer(&engine, "d1", 1, 70).await;

        let err = failing.accept_offer(offer_id).await.unwrap_err();

        assert!(matches!(err, ReconciliationError::TransactionFailure(_)), "{err:?}");
        for id in [offer_id, competitor] {
            let offer = store.offer(id).await.unwrap().unwrap();
            assert_eq!(offer.status(), OfferStatus::Pending);
            assert_eq!(offer.rejection_reason(), None);
        }
        assert!(store.reservation_by_offer(offer_id).await.unwrap().is_none());
        assert!(store.reservations().await.unwrap().is_empty());
        assert_eq!(stock(&store, "d1").await, 5);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn terminal_offers_refuse_transitions_without_side_effects() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5)]);
        let accepted = submit_offer(&engine, "d1", 1, 80).await;
        let rejected = submit_offer(&engine, "d1", 1, 50).await;
        engine.reject_offer(rejected, None).await.unwrap();
        engine.accept_offer(accepted).await.unwrap();
        let sent_before = notifier.sent().len();
        let reservations_before = store.reservations().await.unwrap().len();

        for (id, action) in [
            (accepted, OfferAction::Accept),
            (accepted, OfferAction::Reject { reason: None }),
            (rejected, OfferAction::Reject { reason: Some("otra vez".to_string()) }),
            (rejected, OfferAction::Accept),
        ] {
            let err = engine.decide_offer(id, action).await.unwrap_err();
            assert!(matches!(err, ReconciliationError::InvalidTransition(_)), "{err:?}");
        }

        assert_eq!(stock(&store, "d1").await, 4);
        assert_eq!(store.reservations().await.unwrap().len(), reservations_before);
        assert_eq!(notifier.sent().len(), sent_before);
        let offer = store.offer(rejected).await.unwrap().unwrap();
        assert_eq!(offer.rejection_reason(), Some(DEFAULT_REJECTION_REASON));
    }

    #[tokio::test]
    async fn rejecting_records_reason_and_notifies() {
        let (engine, store, notifier) = setup(vec![device("d1", 100, 5)]);
        let offer_id = submit_offer(&engine, "d1", 1, 55).await;

        let outcome = engine
            .decide_offer(
                offer_id,
                OfferAction::Reject {
                    reason: Some("Precio muy bajo".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(outcome.reservation.is_none());
        assert_eq!(outcome.offer.rejection_reason(), Some("Precio muy bajo"));
        assert_eq!(stock(&store, "d1").await, 5);
        assert!(matches!(
            notifier.sent().last(),
            Some(SentNotification::OfferDecision(n)) if n.decision == OfferDecision::Rejected
        ));
    }

    #[tokio::test]
    async fn unknown_offer_and_reservation_are_not_found() {
        let (engine, _, _) = setup(vec![]);
        assert!(matches!(
            engine.accept_offer(OfferId::new()).await,
            Err(ReconciliationError::OfferNotFound(_))
        ));
        assert!(matches!(
            engine.reject_offer(OfferId::new(), None).await,
            Err(ReconciliationError::OfferNotFound(_))
        ));
        assert!(matches!(
            engine
                .update_reservation_status(ReservationId::new(), ReservationStatusChange::Complete)
                .await,
            Err(ReconciliationError::ReservationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_accepts_on_one_device_let_exactly_one_win() {
        let (engine, store, _) = setup(vec![device("d1", 100, 1)]);
        let first = submit_offer(&engine, "d1", 1, 90).await;
        let second = submit_offer(&engine, "d1", 1, 80).await;

        let (a, b) = tokio::join!(engine.accept_offer(first), engine.accept_offer(second));

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser,
            Err(ReconciliationError::InvalidTransition(_) | ReconciliationError::InsufficientStock(_))
        ));
        assert_eq!(stock(&store, "d1").await, 0);
        assert_eq!(store.reservations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelling_a_reservation_restocks_every_item() {
        let (engine, store, _) = setup(vec![device("A", 10, 5), device("B", 20, 5)]);
        let outcome = engine
            .submit_cart(cart(vec![line("A", 2, 10, 10), line("B", 1, 20, 20)]))
            .await
            .unwrap();
        let id = outcome.reservation.unwrap().id;
        assert_eq!(stock(&store, "A").await, 3);

        let canceled = engine
            .update_reservation_status(id, ReservationStatusChange::Cancel { reason: None })
            .await
            .unwrap();

        assert_eq!(canceled.status(), ReservationStatus::Canceled);
        assert_eq!(canceled.cancellation_reason(), Some(DEFAULT_CANCELLATION_REASON));
        assert_eq!(stock(&store, "A").await, 5);
        assert_eq!(stock(&store, "B").await, 5);

        let err = engine
            .update_reservation_status(id, ReservationStatusChange::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn completing_a_reservation_keeps_stock() {
        let (engine, store, _) = setup(vec![device("A", 10, 5)]);
        let outcome = engine
            .submit_cart(cart(vec![line("A", 2, 10, 10)]))
            .await
            .unwrap();
        let id = outcome.reservation.unwrap().id;

        let completed = engine
            .update_reservation_status(id, ReservationStatusChange::Complete)
            .await
            .unwrap();

        assert_eq!(completed.status(), ReservationStatus::Completed);
        assert_eq!(completed.cancellation_reason(), None);
        assert_eq!(stock(&store, "A").await, 3);

        let err = engine
            .update_reservation_status(
                id,
                ReservationStatusChange::Cancel {
                    reason: Some("tarde".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidTransition(_)));
        assert_eq!(stock(&store, "A").await, 3);
    }

    #[tokio::test]
    async fn failing_notifier_never_undoes_committed_work() {
        let store = InMemoryStore::with_devices([device("d1", 100, 5)]);
        let engine = ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::new(FailingNotifier),
            OfferFloor::default(),
        );

        let outcome = engine
            .submit_cart(cart(vec![line("d1", 1, 100, 100), line("d1", 1, 60, 100)]))
            .await
            .unwrap();
        assert!(outcome.reservation.is_some());
        assert_eq!(stock(&store, "d1").await, 4);

        let accepted = engine.accept_offer(outcome.offers[0].id).await.unwrap();
        assert!(accepted.reservation.is_some());
        assert_eq!(stock(&store, "d1").await, 3);

        assert!(!engine.renotify_offer_decision(outcome.offers[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn renotify_resends_decisions_only() {
        let (engine, _, notifier) = setup(vec![device("d1", 100, 5)]);
        let pending = submit_offer(&engine, "d1", 1, 60).await;
        let err = engine.renotify_offer_decision(pending).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidInput(_)));

        let outcome = engine.accept_offer(pending).await.unwrap();
        let before = notifier.sent().len();
        assert!(engine.renotify_offer_decision(pending).await.unwrap());

        let sent = notifier.sent();
        assert_eq!(sent.len(), before + 1);
        match sent.last() {
            Some(SentNotification::OfferDecision(n)) => {
                assert_eq!(n.reservation_code, outcome.reservation.map(|r| r.code));
            }
            other => panic!("unexpected notification {other:?}"),
        }
    }

    #[tokio::test]
    async fn amounts_follow_reservation_status() {
        let (engine, _, _) = setup(vec![device("d1", 100, 5), device("d2", 10, 2)]);
        let first = engine
            .submit_cart(cart(vec![line("d1", 2, 100, 100)]))
            .await
            .unwrap();
        let second = engine
            .submit_cart(cart(vec![line("d2", 1, 10, 10)]))
            .await
            .unwrap();
        engine
            .update_reservation_status(
                second.reservation.unwrap().id,
                ReservationStatusChange::Complete,
            )
            .await
            .unwrap();

        let amounts = engine.amounts().await.unwrap();
        // stock after: d1 = 3, d2 = 1
        assert_eq!(amounts.published, Money::from(310));
        assert_eq!(amounts.offered, first.reservation.unwrap().total());
        assert_eq!(amounts.paid, Money::from(10));
    }

    #[tokio::test]
    async fn upsert_creates_then_revises_devices() {
        let (engine, _, _) = setup(vec![]);
        let spec = device("x", 100, 2).spec();

        let created = engine.upsert_device(did("x"), spec.clone()).await.unwrap();
        assert_eq!(created.stock(), 2);

        let revised = engine
            .upsert_device(
                did("x"),
                DeviceSpec {
                    stock: 7,
                    ..spec.clone()
                },
            )
            .await
            .unwrap();
        assert_eq!(revised.stock(), 7);
        assert_eq!(revised.created_at, created.created_at);

        let err = engine
            .upsert_device(
                did("x"),
                DeviceSpec {
                    price: Money::ZERO,
                    ..spec
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidInput(_)));
        assert_eq!(engine.device(&did("x")).await.unwrap().stock(), 7);
    }
}
