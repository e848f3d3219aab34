use thiserror::Error;

pub type EscrowResult<T> = Result<T, EscrowError>;

/// Failure taxonomy shared by the client, the store, and the HTTP service.
///
/// The protocol variants (`KeyLength` through `AuthEvicted`) each map to a
/// fixed HTTP status and wire message, so a failure raised by the in-process
/// store and the same failure relayed over HTTP compare equal on the client.
#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("invalid key length: {0} bytes")]
    KeyLength(usize),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage id conflict")]
    Conflict,

    #[error("storage id not found")]
    NotFound,

    #[error("authentication failed")]
    Authentication,

    #[error("authentication failed, entry evicted")]
    AuthEvicted,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wire messages used by the keystore service. Deployed clients match on these.
pub const MSG_CONFLICT: &str = "SU conflict";
pub const MSG_NOT_FOUND: &str = "SU not found in keyserver";
pub const MSG_AUTH: &str = "auth error";
pub const MSG_AUTH_EVICTED: &str = "auth error, key removed!";

impl EscrowError {
    /// HTTP status the keystore answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            EscrowError::KeyLength(_) | EscrowError::Validation(_) | EscrowError::Conflict => 400,
            EscrowError::NotFound => 404,
            EscrowError::Authentication | EscrowError::AuthEvicted => 401,
            _ => 500,
        }
    }

    /// Message placed in the `error` field of a failure body.
    pub fn wire_message(&self) -> String {
        match self {
            EscrowError::Validation(msg) => msg.clone(),
            EscrowError::Conflict => MSG_CONFLICT.into(),
            EscrowError::NotFound => MSG_NOT_FOUND.into(),
            EscrowError::Authentication => MSG_AUTH.into(),
            EscrowError::AuthEvicted => MSG_AUTH_EVICTED.into(),
            EscrowError::KeyLength(n) => format!("invalid key length: {n} bytes"),
            _ => "internal error".into(),
        }
    }

    /// Rebuild a protocol error from a keystore failure response.
    pub fn from_response(status: u16, message: &str) -> Self {
        match (status, message) {
            (400, MSG_CONFLICT) => EscrowError::Conflict,
            (400, msg) => EscrowError::Validation(msg.to_string()),
            (404, _) => EscrowError::NotFound,
            (401, MSG_AUTH_EVICTED) => EscrowError::AuthEvicted,
            (401, _) => EscrowError::Authentication,
            (status, msg) => EscrowError::Transport(format!("HTTP {status}: {msg}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip_for_protocol_errors() {
        let cases = [
            EscrowError::Conflict,
            EscrowError::NotFound,
            EscrowError::Authentication,
            EscrowError::AuthEvicted,
            EscrowError::Validation("The length of ST is invalid.".into()),
        ];
        for err in cases {
            let back = EscrowError::from_response(err.status_code(), &err.wire_message());
            assert_eq!(back.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_unexpected_status_is_transport() {
        let err = EscrowError::from_response(502, "bad gateway");
        assert!(matches!(err, EscrowError::Transport(_)));
    }
}
