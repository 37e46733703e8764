use crate::domain_model::BlockRecord;

/// Terminal result of a pipeline call. Every call ends in exactly one.
///
/// `Success(None)` is a valid success: a 2xx whose body is empty or does not
/// match the requested payload type (deletes, idempotent writes).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Success(Option<T>),
    AuthExpired,
    RemoteError { status: u16, message: String },
    NetworkError { message: String },
    Blocked(BlockRecord),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestOutcome::Success(_) => "success",
            RequestOutcome::AuthExpired => "auth_expired",
            RequestOutcome::RemoteError { .. } => "remote_error",
            RequestOutcome::NetworkError { .. } => "network_error",
            RequestOutcome::Blocked(_) => "blocked",
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            RequestOutcome::Success(payload) => payload,
            _ => None,
        }
    }
}
