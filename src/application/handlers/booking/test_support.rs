//! Fixtures shared by the handler tests.

use std::sync::Arc;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::InMemoryBookingStore;
use crate::adapters::retry::FixedDelayRetry;
use crate::adapters::stripe::MockPaymentGateway;
use crate::domain::booking::{
    ContactSnapshot, Event, PaymentStatus, RefundRecord, Reservation, ResourceRef,
};
use crate::domain::foundation::{Currency, EventId, Money, ReservationId, Timestamp, UserId};
use crate::ports::{BookingUnitOfWork, CheckoutMetadata, CheckoutRequest, RetryConfig};

use super::{
    inventory_ledger, BookingTarget, CancelReservationHandler, CancelWithRefundCommand,
    CancelWithRefundHandler, CheckoutUrls, ConfirmPaymentCommand, ConfirmPaymentHandler,
    ConfirmQuantityIncreaseHandler, CreateReservationCommand, CreateReservationHandler,
    GetReservationHandler, RefundPolicies, ReleaseAbandonedHandler, ReviewRefundHandler,
    UpdateQuantityHandler,
};

pub const TICKET_PRICE: i64 = 2_500;

pub fn event(capacity: u32) -> Event {
    event_starting(capacity, Timestamp::now().add_days(30))
}

fn event_starting(capacity: u32, starts_at: Timestamp) -> Event {
    Event {
        id: EventId::new(),
        title: "Spring workshop".to_string(),
        capacity,
        consumed_count: 0,
        starts_at,
        unit_price: Money::from_minor(TICKET_PRICE).unwrap(),
        currency: Currency::new("usd").unwrap(),
    }
}

/// A registration already paid through the gateway. Does not touch any pool.
pub fn paid_registration(event: &Event, user: &str, quantity: u32) -> Reservation {
    let now = Timestamp::now();
    let mut reservation = Reservation::create(
        ReservationId::new(),
        UserId::new(user).unwrap(),
        ResourceRef::Event { event_id: event.id },
        ContactSnapshot::new("Ada", "ada@example.com", "5550102030").unwrap(),
        event.starts_at,
        event.unit_price,
        event.currency.clone(),
        quantity,
        now,
    )
    .unwrap();
    reservation.attach_checkout(format!("cs_seed_{}", reservation.id.as_uuid().simple()), now);
    reservation
        .confirm_payment(format!("pi_seed_{}", reservation.id.as_uuid().simple()), now)
        .unwrap();
    reservation
}

pub fn checkout_request(amount: i64) -> CheckoutRequest {
    CheckoutRequest {
        amount: Money::from_minor(amount).unwrap(),
        currency: Currency::new("usd").unwrap(),
        line_item_description: "Appointment D1 2099-01-10 10:00".to_string(),
        success_url: "https://app.test/done".to_string(),
        cancel_url: "https://app.test/cancel".to_string(),
        metadata: CheckoutMetadata {
            reservation_id: ReservationId::new(),
            user_id: UserId::new("user-1").unwrap(),
            event_id: None,
            quantity: 1,
            target_quantity: None,
        },
    }
}

pub fn appointment_command(user: &str, date: &str, time: &str) -> CreateReservationCommand {
    CreateReservationCommand {
        user_id: UserId::new(user).unwrap(),
        target: BookingTarget::Appointment {
            provider_id: "D1".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            fee: 8_000,
            currency: "usd".to_string(),
        },
        contact_name: "Ada".to_string(),
        contact_email: "ada@example.com".to_string(),
        contact_phone: "5550102030".to_string(),
    }
}

/// In-memory store, mock gateway and capturing bus wired into every handler.
pub struct Harness {
    pub store: InMemoryBookingStore,
    pub gateway: MockPaymentGateway,
    pub bus: Arc<InMemoryEventBus>,
    pub retry: Arc<FixedDelayRetry>,
    pub urls: CheckoutUrls,
    pub policies: RefundPolicies,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: InMemoryBookingStore::new(),
            gateway: MockPaymentGateway::new(),
            bus: Arc::new(InMemoryEventBus::new()),
            retry: Arc::new(FixedDelayRetry::new(RetryConfig::immediate(3))),
            urls: CheckoutUrls::new(
                "https://app.test/bookings/{reservation_id}/done",
                "https://app.test/bookings/{reservation_id}",
            ),
            policies: RefundPolicies::default(),
        }
    }

    fn uow(&self) -> Arc<dyn BookingUnitOfWork> {
        Arc::new(self.store.clone())
    }

    fn gateway(&self) -> Arc<MockPaymentGateway> {
        Arc::new(self.gateway.clone())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Handlers
    // ════════════════════════════════════════════════════════════════════════════

    pub fn create_handler(&self) -> CreateReservationHandler {
        CreateReservationHandler::new(self.uow(), self.gateway(), self.bus.clone(), self.urls.clone())
    }

    pub fn cancel_handler(&self) -> CancelReservationHandler {
        CancelReservationHandler::new(self.uow(), self.bus.clone())
    }

    pub fn confirm_handler(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(self.uow(), self.gateway(), self.retry.clone(), self.bus.clone())
    }

    pub fn refund_handler(&self) -> CancelWithRefundHandler {
        CancelWithRefundHandler::new(
            self.uow(),
            self.gateway(),
            self.bus.clone(),
            self.policies.clone(),
        )
    }

    pub fn review_handler(&self) -> ReviewRefundHandler {
        ReviewRefundHandler::new(self.uow(), self.gateway(), self.bus.clone())
    }

    pub fn quantity_handler(&self) -> UpdateQuantityHandler {
        UpdateQuantityHandler::new(
            self.uow(),
            self.gateway(),
            self.bus.clone(),
            self.policies.clone(),
            self.urls.clone(),
        )
    }

    pub fn confirm_top_up_handler(&self) -> ConfirmQuantityIncreaseHandler {
        ConfirmQuantityIncreaseHandler::new(
            self.uow(),
            self.gateway(),
            self.retry.clone(),
            self.bus.clone(),
        )
    }

    pub fn get_handler(&self) -> GetReservationHandler {
        GetReservationHandler::new(self.uow())
    }

    pub fn release_handler(&self) -> ReleaseAbandonedHandler {
        ReleaseAbandonedHandler::new(self.uow(), self.gateway(), self.bus.clone())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Seeding
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn seed_event(&self, capacity: u32) -> Event {
        let event = event(capacity);
        self.store.insert_event(event.clone()).await;
        event
    }

    /// Event starting `days` whole days (plus an hour) from now.
    pub async fn seed_event_in_days(&self, capacity: u32, days: i64) -> Event {
        let event = event_starting(capacity, Timestamp::now().add_days(days).add_minutes(60));
        self.store.insert_event(event.clone()).await;
        event
    }

    pub fn registration_command(&self, user: &str, event: &Event, quantity: u32) -> CreateReservationCommand {
        CreateReservationCommand {
            target: BookingTarget::Registration {
                event_id: event.id,
                quantity,
            },
            ..appointment_command(user, "2099-01-10", "10:00")
        }
    }

    /// Pending registration with an open checkout.
    pub async fn register(&self, user: &str, event: &Event, quantity: u32) -> Reservation {
        self.create_handler()
            .handle(self.registration_command(user, event, quantity))
            .await
            .unwrap()
            .reservation
    }

    /// Paid registration stored directly, with the pool recounted and the
    /// charge known to the gateway.
    pub async fn paid_registration(&self, event: &Event, user: &str, quantity: u32) -> Reservation {
        let reservation = paid_registration(event, user, quantity);
        for charge in &reservation.charges {
            self.gateway.record_charge(&charge.payment_reference, charge.amount);
        }
        self.store.put_reservation(reservation.clone()).await;

        let mut tx = self.store.begin().await.unwrap();
        inventory_ledger::recompute(tx.as_mut(), &event.id).await.unwrap();
        tx.commit().await.unwrap();
        reservation
    }

    /// Pending appointment with an open checkout.
    pub async fn book_slot(&self, user: &str, date: &str, time: &str) -> Reservation {
        self.create_handler()
            .handle(appointment_command(user, date, time))
            .await
            .unwrap()
            .reservation
    }

    /// Appointment booked and confirmed through the handlers.
    pub async fn paid_slot(&self, user: &str, date: &str, time: &str) -> Reservation {
        let created = self.book_slot(user, date, time).await;
        let session_id = created.checkout_session_id.clone().unwrap();
        self.gateway.complete_session(&session_id);

        let confirmed = self
            .confirm_handler()
            .handle(ConfirmPaymentCommand {
                user_id: UserId::new(user).unwrap(),
                reservation_id: created.id,
                session_id,
            })
            .await
            .unwrap();
        assert_eq!(confirmed.reservation.payment_status, PaymentStatus::Paid);
        confirmed.reservation
    }

    /// Paid appointment cancelled under the review-mode policy.
    pub async fn pending_refund(&self, user: &str) -> (Reservation, RefundRecord) {
        let reservation = self.paid_slot(user, "2099-01-10", "10:00").await;
        let result = self
            .refund_handler()
            .handle(CancelWithRefundCommand {
                user_id: UserId::new(user).unwrap(),
                reservation_id: reservation.id,
                reason: "Cannot make it that week".to_string(),
            })
            .await
            .unwrap();
        (result.reservation, result.refund)
    }

    /// Moves a reservation's creation time `minutes` into the past.
    pub async fn age_reservation(&self, id: &ReservationId, minutes: i64) {
        let mut reservation = self.store.reservation(id).await.unwrap();
        reservation.created_at = Timestamp::now().add_minutes(-minutes);
        self.store.put_reservation(reservation).await;
    }
}
