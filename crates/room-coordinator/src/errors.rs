//! Room Coordinator error types.
//!
//! Errors map to signaling `ErrorCode` values for client responses.
//! Internal details are logged server-side but not exposed to clients.
//!
//! Admission denials are not errors: they are returned as
//! [`AdmissionOutcome::Denied`](crate::admission::AdmissionOutcome) values.

use thiserror::Error;

/// Room Coordinator error type.
///
/// Maps to signaling `ErrorCode` values:
/// - `PermissionDenied`: `FORBIDDEN` (3)
/// - `RoomNotFound`, `ParticipantNotFound`: `NOT_FOUND` (4)
/// - `Conflict`: `CONFLICT` (5)
/// - `Internal`, `Collaborator`: `INTERNAL_ERROR` (6)
/// - `Draining`, `CoordinatorCapacityExceeded`: `CAPACITY_EXCEEDED` (7)
#[derive(Debug, Error)]
pub enum RoomError {
    /// No room actor exists for the id.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Participant not registered in the room.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Caller lacks the right required for the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Conflict error (e.g., room already open).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Coordinator is draining (graceful shutdown).
    #[error("Coordinator is draining")]
    Draining,

    /// Coordinator reached its configured room limit.
    #[error("Coordinator at capacity")]
    CoordinatorCapacityExceeded,

    /// An external collaborator (recording service, appointment store) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Internal error with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Returns the signaling `ErrorCode` value for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            RoomError::PermissionDenied(_) => 3, // FORBIDDEN
            RoomError::RoomNotFound(_) | RoomError::ParticipantNotFound(_) => 4, // NOT_FOUND
            RoomError::Conflict(_) => 5,         // CONFLICT
            RoomError::Collaborator(_) | RoomError::Internal(_) => 6, // INTERNAL_ERROR
            RoomError::Draining | RoomError::CoordinatorCapacityExceeded => 7, // CAPACITY_EXCEEDED
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            RoomError::Collaborator(_) | RoomError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            RoomError::RoomNotFound(_) => "Room not found".to_string(),
            RoomError::ParticipantNotFound(_) => "Participant not found".to_string(),
            RoomError::Draining => "Server is shutting down, please reconnect".to_string(),
            RoomError::CoordinatorCapacityExceeded => {
                "Server is at capacity, please try again".to_string()
            }
            RoomError::Conflict(msg) | RoomError::PermissionDenied(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            RoomError::PermissionDenied("not a moderator".to_string()).error_code(),
            3
        );
        assert_eq!(RoomError::RoomNotFound("7".to_string()).error_code(), 4);
        assert_eq!(
            RoomError::ParticipantNotFound("uid".to_string()).error_code(),
            4
        );
        assert_eq!(RoomError::Conflict("open".to_string()).error_code(), 5);
        assert_eq!(RoomError::Internal("boom".to_string()).error_code(), 6);
        assert_eq!(RoomError::Collaborator("rpc".to_string()).error_code(), 6);
        assert_eq!(RoomError::Draining.error_code(), 7);
        assert_eq!(RoomError::CoordinatorCapacityExceeded.error_code(), 7);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = RoomError::Collaborator("recording service at 10.0.0.4 refused".to_string());
        assert!(!err.client_message().contains("10.0.0.4"));
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = RoomError::Internal("channel send failed: closed".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_permission_denied_message_is_passed_through() {
        let err = RoomError::PermissionDenied("Super moderators cannot be kicked".to_string());
        assert_eq!(err.client_message(), "Super moderators cannot be kicked");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RoomError::RoomNotFound("42".to_string())),
            "Room not found: 42"
        );
        assert_eq!(
            format!("{}", RoomError::Draining),
            "Coordinator is draining"
        );
    }
}
