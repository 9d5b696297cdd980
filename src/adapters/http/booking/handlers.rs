//! HTTP handlers for booking endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::booking::{
    BookingTarget, CancelReservationCommand, CancelReservationHandler, CancelWithRefundCommand,
    CancelWithRefundHandler, CheckoutUrls, ConfirmPaymentCommand, ConfirmPaymentHandler,
    ConfirmQuantityIncreaseCommand, ConfirmQuantityIncreaseHandler, CreateReservationCommand,
    CreateReservationHandler, CreateReservationResult, GetReservationHandler, GetReservationQuery,
    QuantityChange, RefundPolicies, ReleaseAbandonedHandler, ReviewRefundCommand,
    ReviewRefundHandler, UpdateQuantityCommand, UpdateQuantityHandler,
};
use crate::domain::booking::{BookingError, ConflictKind};
use crate::domain::foundation::{EventId, RefundId, ReservationId, UserId};
use crate::ports::{BookingUnitOfWork, EventPublisher, PaymentGateway, RetryPolicy};

use super::dto::{
    CancelReservationRequest, CancelReservationResponse, ConfirmPaymentResponse,
    ConfirmSessionRequest, CreateAppointmentRequest, CreateRegistrationRequest,
    CreateReservationResponse, ErrorResponse, RefundRecordResponse, RefundRequest,
    RefundResponse, ReservationResponse, ReviewRefundRequest, SlotResponse,
    UpdateQuantityRequest, UpdateQuantityResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct BookingAppState {
    pub store: Arc<dyn BookingUnitOfWork>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub retry: Arc<dyn RetryPolicy>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub checkout_urls: CheckoutUrls,
    pub refund_policies: RefundPolicies,
    /// Currency for appointment requests that do not name one.
    pub default_currency: String,
    /// Include internal error detail in responses (development only).
    pub expose_diagnostics: bool,
}

impl BookingAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_reservation_handler(&self) -> CreateReservationHandler {
        CreateReservationHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
            self.checkout_urls.clone(),
        )
    }

    pub fn get_reservation_handler(&self) -> GetReservationHandler {
        GetReservationHandler::new(self.store.clone())
    }

    pub fn confirm_payment_handler(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.retry.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn cancel_reservation_handler(&self) -> CancelReservationHandler {
        CancelReservationHandler::new(self.store.clone(), self.event_publisher.clone())
    }

    pub fn cancel_with_refund_handler(&self) -> CancelWithRefundHandler {
        CancelWithRefundHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
            self.refund_policies.clone(),
        )
    }

    pub fn update_quantity_handler(&self) -> UpdateQuantityHandler {
        UpdateQuantityHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
            self.refund_policies.clone(),
            self.checkout_urls.clone(),
        )
    }

    pub fn confirm_quantity_handler(&self) -> ConfirmQuantityIncreaseHandler {
        ConfirmQuantityIncreaseHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.retry.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn review_refund_handler(&self) -> ReviewRefundHandler {
        ReviewRefundHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
        )
    }

    /// Used by the background sweep rather than a route.
    pub fn release_abandoned_handler(&self) -> ReleaseAbandonedHandler {
        ReleaseAbandonedHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
        )
    }

    /// Wraps a booking error for the response, honoring the diagnostics setting.
    pub fn reject(&self, error: BookingError) -> BookingApiError {
        BookingApiError {
            error,
            expose_diagnostic: self.expose_diagnostics,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (identity is asserted by the upstream gateway)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// Identity is established upstream; the proxy forwards it in `X-User-Id`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

fn user_from_parts(parts: &axum::http::request::Parts) -> Option<UserId> {
    parts
        .headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::new(s).ok())
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = user_from_parts(parts).ok_or(AuthenticationRequired)?;
            Ok(AuthenticatedUser { user_id })
        })
    }
}

/// Authenticated user carrying `X-User-Role: admin`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: UserId,
}

/// Rejection type for AdminUser extraction.
pub enum AdminRejection {
    Unauthenticated,
    NotAdmin,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminRejection::Unauthenticated => AuthenticationRequired.into_response(),
            AdminRejection::NotAdmin => {
                let error = ErrorResponse::new("FORBIDDEN", "Admin role required");
                (StatusCode::FORBIDDEN, Json(error)).into_response()
            }
        }
    }
}

impl<S> axum::extract::FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = user_from_parts(parts).ok_or(AdminRejection::Unauthenticated)?;
            let is_admin = parts
                .headers
                .get("X-User-Role")
                .and_then(|v| v.to_str().ok())
                .map(|role| role.eq_ignore_ascii_case("admin"))
                .unwrap_or(false);
            if !is_admin {
                tracing::warn!(user_id = %user_id, "Admin endpoint called without admin role");
                return Err(AdminRejection::NotAdmin);
            }
            Ok(AdminUser { user_id })
        })
    }
}

fn parse_reservation_id(raw: &str) -> Result<ReservationId, BookingError> {
    raw.parse()
        .map_err(|_| BookingError::validation("reservation_id", "not a valid reservation id"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/reservations/:id - Read own reservation
pub async fn get_reservation(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let query = GetReservationQuery {
        user_id: user.user_id,
        reservation_id,
    };

    let result = state
        .get_reservation_handler()
        .handle(query)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(ReservationResponse::new(
        &result.reservation,
        result.refund.as_ref(),
    )))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/reservations/appointments - Book a slot and open checkout
pub async fn create_appointment(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let cmd = CreateReservationCommand {
        user_id: user.user_id,
        target: BookingTarget::Appointment {
            provider_id: request.provider_id,
            date: request.date,
            time: request.time,
            fee: request.fee,
            currency: request
                .currency
                .unwrap_or_else(|| state.default_currency.clone()),
        },
        contact_name: request.name,
        contact_email: request.email,
        contact_phone: request.phone,
    };

    let result = state
        .create_reservation_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((StatusCode::CREATED, Json(created_response(result))))
}

/// POST /api/reservations/registrations - Register for an event and open checkout
pub async fn create_registration(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let event_id: EventId = request
        .event_id
        .parse()
        .map_err(|_| state.reject(BookingError::validation("event_id", "not a valid event id")))?;
    let cmd = CreateReservationCommand {
        user_id: user.user_id,
        target: BookingTarget::Registration {
            event_id,
            quantity: request.quantity,
        },
        contact_name: request.name,
        contact_email: request.email,
        contact_phone: request.phone,
    };

    let result = state
        .create_reservation_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((StatusCode::CREATED, Json(created_response(result))))
}

fn created_response(result: CreateReservationResult) -> CreateReservationResponse {
    CreateReservationResponse {
        reservation_id: result.reservation.id.to_string(),
        checkout_url: result.checkout_url,
        checkout_expires_at: result.checkout_expires_at.as_datetime().to_rfc3339(),
    }
}

/// POST /api/reservations/:id/confirm - Reconcile the returned checkout
pub async fn confirm_payment(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<ConfirmSessionRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let cmd = ConfirmPaymentCommand {
        user_id: user.user_id,
        reservation_id,
        session_id: request.session_id,
    };

    let result = state
        .confirm_payment_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(ConfirmPaymentResponse {
        reservation_id: result.reservation.id.to_string(),
        quantity: result.reservation.quantity,
        slot: result.reservation.resource.slot().map(SlotResponse::from),
    }))
}

/// POST /api/reservations/:id/cancel - Cancel without refund
pub async fn cancel_reservation(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    request: Option<Json<CancelReservationRequest>>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cmd = CancelReservationCommand {
        user_id: user.user_id,
        reservation_id,
        reason: request.reason,
    };

    let result = state
        .cancel_reservation_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(CancelReservationResponse {
        reservation_id: result.reservation.id.to_string(),
        status: result.reservation.status,
    }))
}

/// POST /api/reservations/:id/refund - Cancel with a policy refund
pub async fn cancel_with_refund(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let cmd = CancelWithRefundCommand {
        user_id: user.user_id,
        reservation_id,
        reason: request.reason,
    };

    let result = state
        .cancel_with_refund_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(RefundResponse::from(&result.refund)))
}

/// POST /api/reservations/:id/quantity - Change ticket count
///
/// 200 for reductions (applied immediately), 201 when a top-up checkout was opened.
pub async fn update_quantity(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let cmd = UpdateQuantityCommand {
        user_id: user.user_id,
        reservation_id,
        quantity: request.quantity,
    };

    let result = state
        .update_quantity_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    let reservation_id = result.reservation.id.to_string();
    let quantity = result.reservation.quantity;
    let (status, response) = match result.change {
        QuantityChange::Reduced { refund_amount, .. } => (
            StatusCode::OK,
            UpdateQuantityResponse {
                reservation_id,
                quantity,
                refund_amount: Some(refund_amount.minor()),
                checkout_url: None,
                session_id: None,
                amount_due: None,
            },
        ),
        QuantityChange::CheckoutRequired {
            session_id,
            checkout_url,
            amount,
            ..
        } => (
            StatusCode::CREATED,
            UpdateQuantityResponse {
                reservation_id,
                quantity,
                refund_amount: None,
                checkout_url: Some(checkout_url),
                session_id: Some(session_id),
                amount_due: Some(amount.minor()),
            },
        ),
    };

    Ok((status, Json(response)))
}

/// POST /api/reservations/:id/quantity/confirm - Commit a paid top-up
pub async fn confirm_quantity_increase(
    State(state): State<BookingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<ConfirmSessionRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let reservation_id = parse_reservation_id(&id).map_err(|e| state.reject(e))?;
    let cmd = ConfirmQuantityIncreaseCommand {
        user_id: user.user_id,
        reservation_id,
        session_id: request.session_id,
    };

    let result = state
        .confirm_quantity_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(ReservationResponse::new(&result.reservation, None)))
}

/// POST /api/admin/refunds/:id/review - Approve, reject or process a refund
pub async fn review_refund(
    State(state): State<BookingAppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<ReviewRefundRequest>,
) -> Result<impl IntoResponse, BookingApiError> {
    let refund_id: RefundId = id
        .parse()
        .map_err(|_| state.reject(BookingError::validation("refund_id", "not a valid refund id")))?;
    let cmd = ReviewRefundCommand {
        reviewer: admin.user_id,
        refund_id,
        decision: request.decision,
    };

    let result = state
        .review_refund_handler()
        .handle(cmd)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(RefundRecordResponse::from(&result.refund)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts booking errors to HTTP responses.
pub struct BookingApiError {
    error: BookingError,
    expose_diagnostic: bool,
}

impl From<BookingError> for BookingApiError {
    fn from(error: BookingError) -> Self {
        Self {
            error,
            expose_diagnostic: false,
        }
    }
}

/// HTTP status for a booking error.
pub fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::Validation { .. } => StatusCode::BAD_REQUEST,
        BookingError::Conflict {
            kind: ConflictKind::InvalidState,
            ..
        } => StatusCode::BAD_REQUEST,
        BookingError::Conflict { .. } => StatusCode::CONFLICT,
        BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
        // The body's code tells an unpaid session apart from a gateway outage.
        BookingError::GatewayTransient(_)
        | BookingError::GatewayFatal(_)
        | BookingError::InvariantViolation(_)
        | BookingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for BookingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            tracing::error!(code = self.error.code(), error = %self.error, "Request failed");
        }

        let mut body = ErrorResponse::new(self.error.code(), self.error.public_message());
        if self.expose_diagnostic {
            body = body.with_diagnostic(self.error.to_string());
        }
        (status, Json(body)).into_response()
    }
}
