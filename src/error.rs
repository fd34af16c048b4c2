use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::{ActorRole, OrderStatus};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transition {from} -> {to} is not defined for role {role}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        role: ActorRole,
    },

    #[error("role {role} may not move an order from {from} to {to}")]
    RoleNotPermitted {
        from: OrderStatus,
        to: OrderStatus,
        role: ActorRole,
    },

    #[error("order is in terminal state {0}")]
    TerminalState(OrderStatus),

    #[error("version conflict: expected {expected}, current is {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("cancellation requires a non-empty note")]
    CancellationRequiresNote,

    #[error("payment has not been settled")]
    PaymentNotSettled,

    #[error("picked quantity {requested} for item {item_id} is outside 0..={ordered}")]
    QuantityOutOfRange {
        item_id: String,
        requested: i64,
        ordered: u32,
    },

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("packing is not active for order {0}")]
    PackingNotActive(Uuid),

    #[error("order {order_id} in status {status} cannot take a {role} assignment")]
    NotAssignable {
        order_id: Uuid,
        role: ActorRole,
        status: OrderStatus,
    },

    #[error("personnel {0} is unavailable")]
    PersonnelUnavailable(String),

    #[error("no {0} available")]
    NoAvailablePersonnel(ActorRole),

    #[error("assignment for order {order_id} gave up after {attempts} attempts")]
    AssignmentRetryExhausted { order_id: Uuid, attempts: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::RoleNotPermitted { .. } => "RoleNotPermitted",
            AppError::TerminalState(_) => "TerminalState",
            AppError::VersionConflict { .. } => "VersionConflict",
            AppError::CancellationRequiresNote => "CancellationRequiresNote",
            AppError::PaymentNotSettled => "PaymentNotSettled",
            AppError::QuantityOutOfRange { .. } => "QuantityOutOfRange",
            AppError::UnknownItem(_) => "UnknownItem",
            AppError::PackingNotActive(_) => "PackingNotActive",
            AppError::NotAssignable { .. } => "NotAssignable",
            AppError::PersonnelUnavailable(_) => "PersonnelUnavailable",
            AppError::NoAvailablePersonnel(_) => "NoAvailablePersonnel",
            AppError::AssignmentRetryExhausted { .. } => "AssignmentRetryExhausted",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UnknownItem(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::QuantityOutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RoleNotPermitted { .. } => StatusCode::FORBIDDEN,
            AppError::Conflict(_)
            | AppError::VersionConflict { .. }
            | AppError::PackingNotActive(_)
            | AppError::NotAssignable { .. }
            | AppError::PersonnelUnavailable(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. }
            | AppError::TerminalState(_)
            | AppError::CancellationRequiresNote
            | AppError::PaymentNotSettled => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoAvailablePersonnel(_) | AppError::AssignmentRetryExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;
    use crate::models::order::{ActorRole, OrderStatus};

    #[test]
    fn invalid_transition_names_states_and_role() {
        let err = AppError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
            role: ActorRole::Rider,
        };

        let message = err.to_string();
        assert!(message.contains("pending"));
        assert!(message.contains("delivered"));
        assert!(message.contains("rider"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn capacity_errors_map_to_service_unavailable() {
        let exhausted = AppError::AssignmentRetryExhausted {
            order_id: uuid::Uuid::nil(),
            attempts: 3,
        };
        assert_eq!(exhausted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::PersonnelUnavailable("p1".to_string()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
