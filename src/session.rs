//! Session-bus connection lifecycle and the live-notification registry.

use std::time::Duration;

use dbus::blocking::Connection;
use dbus::Message;
use tracing::debug;

use crate::bus;
use crate::error::Error;
use crate::event::{self, CloseReason};
use crate::notification::Notification;

/// Detail message reported while no error is recorded. Distinct from
/// every real error message.
pub(crate) const NO_ERROR_MESSAGE: &str = "No error";

/// A connection context: a private session-bus connection, the default
/// application identity, the last-error state and the registry of
/// notifications still awaiting a close event.
///
/// The connection is opened lazily by the first operation that needs
/// it. Dropping the session disconnects, which delivers a
/// [`CloseReason::Disconnected`] event to every tracked notification.
pub struct Session {
    pub(crate) conn: Option<Connection>,
    app_name: Option<String>,
    app_icon: Option<String>,
    error: Option<Error>,
    pub(crate) tracked: Vec<Notification>,
}

impl Session {
    /// Creates a disconnected session. `app_name` and `app_icon` are the
    /// defaults substituted into notifications that don't override them.
    pub fn new(app_name: Option<&str>, app_icon: Option<&str>) -> Self {
        Session {
            conn: None,
            app_name: app_name.map(str::to_owned),
            app_icon: app_icon.map(str::to_owned),
            error: None,
            tracked: Vec::new(),
        }
    }

    /// Opens the private session-bus connection if there is none yet.
    ///
    /// Idempotent while the connection is healthy. A connection that
    /// reports itself disconnected is torn down first (including the
    /// registry drain of [`disconnect`](Self::disconnect)) and then
    /// reopened.
    pub fn connect(&mut self) -> Result<(), Error> {
        let stale = self
            .conn
            .as_ref()
            .is_some_and(|conn| !conn.channel().is_connected());
        if stale {
            debug!("session-bus connection went away, reconnecting");
            self.disconnect();
        }

        if self.conn.is_none() {
            match Connection::new_session() {
                Ok(conn) => self.conn = Some(conn),
                Err(err) => return Err(self.record(Error::DbusConnect(err.to_string()))),
            }
        }

        self.record_ok();
        Ok(())
    }

    /// Emits a [`CloseReason::Disconnected`] close event for every
    /// tracked notification (in registry order, which is not the send
    /// order), empties the registry, and drops the connection. Safe to
    /// call when not connected.
    pub fn disconnect(&mut self) {
        if self.conn.is_some() {
            self.drain_registry();
            self.conn = None;
        }
        self.record_ok();
    }

    fn drain_registry(&mut self) {
        for notification in std::mem::take(&mut self.tracked) {
            event::emit_closed(&notification, CloseReason::Disconnected);
        }
    }

    /// Default application name; `None` clears it.
    pub fn set_app_name(&mut self, app_name: Option<&str>) {
        self.app_name = app_name.map(str::to_owned);
    }

    /// Default application icon; `None` clears it.
    pub fn set_app_icon(&mut self, app_icon: Option<&str>) {
        self.app_icon = app_icon.map(str::to_owned);
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn app_icon(&self) -> Option<&str> {
        self.app_icon.as_deref()
    }

    /// Outcome of the most recently completed fallible call through this
    /// session; `None` if it succeeded.
    pub fn last_error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Detail message for the most recent outcome, `"No error"` after a
    /// success. May embed the transport's own error text.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(error) => error.to_string(),
            None => NO_ERROR_MESSAGE.to_owned(),
        }
    }

    /// Records a failed outcome and hands the error back, so call sites
    /// can `return Err(session.record(...))`.
    pub(crate) fn record(&mut self, error: Error) -> Error {
        self.error = Some(error.clone());
        error
    }

    pub(crate) fn record_ok(&mut self) {
        self.error = None;
    }

    /// One synchronous round-trip on the current connection.
    pub(crate) fn call_blocking(
        &mut self,
        msg: Message,
        timeout: Duration,
    ) -> Result<Message, Error> {
        let sent = match &self.conn {
            Some(conn) => conn.channel().send_with_reply_and_block(msg, timeout),
            None => Err(dbus::Error::new_failed("connection is gone")),
        };
        sent.map_err(|err| self.record(Error::DbusSend(err.to_string())))
    }

    /// Registers a notification for close/action event delivery. No-op
    /// without a close callback, or when already tracked. The first
    /// registration on a connection installs the signal match rules.
    pub(crate) fn track(&mut self, notification: &Notification) -> Result<(), Error> {
        if !notification.has_close_callback() {
            return Ok(());
        }
        if self
            .tracked
            .iter()
            .any(|tracked| Notification::ptr_eq(tracked, notification))
        {
            return Ok(());
        }

        if self.tracked.is_empty() {
            self.install_signal_matches()?;
        }
        self.tracked.push(notification.clone());
        Ok(())
    }

    pub(crate) fn untrack(&mut self, notification: &Notification) {
        self.tracked
            .retain(|tracked| !Notification::ptr_eq(tracked, notification));
    }

    fn install_signal_matches(&mut self) -> Result<(), Error> {
        let installed = match &self.conn {
            Some(conn) => bus::signal_match_rules()
                .iter()
                .try_for_each(|rule| conn.add_match_no_cb(&rule.match_str())),
            None => Err(dbus::Error::new_failed("connection is gone")),
        };
        installed.map_err(|err| self.record(Error::DbusSend(err.to_string())))
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(None, None)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
        debug_assert!(self.tracked.is_empty());
    }
}
