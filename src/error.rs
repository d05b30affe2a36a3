//! Error reporting for session-mediated operations.
//!
//! Every fallible operation returns exactly one of these errors and also
//! records it on the [`Session`](crate::Session) it went through, so the
//! outcome of the most recent call can always be queried afterwards via
//! [`Session::last_error`](crate::Session::last_error). There is no
//! "no error" variant; a successful call clears the session's slot
//! instead.

/// Discriminant-only mirror of [`Error`], for callers that want to match
/// on the kind without caring about the detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DbusConnect,
    DbusSend,
    InvalidReply,
    NoNotificationId,
}

/// An error from a session-mediated operation.
///
/// The detail string embeds the underlying transport's own error text
/// where one exists. Transport failures are never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Establishing the session-bus connection failed.
    #[error("Connecting to D-Bus failed: {0}")]
    DbusConnect(String),

    /// Sending a message over the bus failed.
    #[error("Sending message over D-Bus failed: {0}")]
    DbusSend(String),

    /// The server's reply did not have the expected shape.
    #[error("Invalid reply received: {0}")]
    InvalidReply(String),

    /// The notification has no bus-assigned id, which the operation
    /// requires (e.g. closing a notification that was never sent).
    #[error("No notification-id is specified")]
    NoNotificationId,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DbusConnect(_) => ErrorKind::DbusConnect,
            Error::DbusSend(_) => ErrorKind::DbusSend,
            Error::InvalidReply(_) => ErrorKind::InvalidReply,
            Error::NoNotificationId => ErrorKind::NoNotificationId,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::DbusConnect(String::new()).kind(),
            ErrorKind::DbusConnect
        );
        assert_eq!(Error::DbusSend(String::new()).kind(), ErrorKind::DbusSend);
        assert_eq!(
            Error::InvalidReply(String::new()).kind(),
            ErrorKind::InvalidReply
        );
        assert_eq!(Error::NoNotificationId.kind(), ErrorKind::NoNotificationId);
    }

    #[test]
    fn test_detail_is_embedded() {
        let error = Error::DbusConnect("org.freedesktop.DBus.Error.NoServer".to_owned());
        assert_eq!(
            error.to_string(),
            "Connecting to D-Bus failed: org.freedesktop.DBus.Error.NoServer"
        );
    }

    #[test]
    fn test_messages_are_distinct_from_no_error() {
        let errors = [
            Error::DbusConnect("x".to_owned()),
            Error::DbusSend("x".to_owned()),
            Error::InvalidReply("x".to_owned()),
            Error::NoNotificationId,
        ];
        for error in errors {
            assert_ne!(error.to_string(), crate::session::NO_ERROR_MESSAGE);
        }
    }
}
