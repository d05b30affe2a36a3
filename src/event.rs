//! Close/action callbacks and the inbound signal pump.
//!
//! [`Session::dispatch`] is the single re-entry point for events from
//! the notification server: it runs one bounded read/write cycle on the
//! connection, drains the message queue, and fires the callbacks bound
//! to the tracked notifications the signals refer to. The host
//! application calls it periodically from its own loop.

use std::time::Duration;

use dbus::message::MessageType;
use dbus::Message;
use tracing::{debug, warn};

use crate::bus;
use crate::notification::Notification;
use crate::session::Session;

/// Why a notification went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The server reported no recognized reason.
    Unspecified,
    /// The notification expired.
    Expired,
    /// The user dismissed it.
    Dismissed,
    /// A `CloseNotification` call closed it.
    ClosedByCall,
    /// The session disconnected while the notification was still live.
    Disconnected,
}

impl CloseReason {
    fn from_wire(reason: u32) -> Self {
        match reason {
            1 => CloseReason::Expired,
            2 => CloseReason::Dismissed,
            3 => CloseReason::ClosedByCall,
            _ => CloseReason::Unspecified,
        }
    }
}

/// Result of one [`Session::dispatch`] cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Events were processed; tracked notifications remain, so more may
    /// follow.
    Done,
    /// Nothing is tracked anymore.
    AllClosed,
    /// No active connection; there is nothing left to wait for.
    NotConnected,
}

pub(crate) struct Action {
    pub(crate) key: String,
    pub(crate) label: String,
    /// `None` only transiently, while the callback itself is running.
    pub(crate) callback: Option<Box<dyn FnMut(&str)>>,
}

impl Notification {
    /// Binds the close callback, replacing any previous one. It fires
    /// exactly once per send/update cycle, when the notification
    /// closes.
    ///
    /// A bound close callback is what makes a sent notification
    /// eligible for tracking; bind an empty closure if you only care
    /// about actions.
    pub fn bind_close<F>(&self, callback: F)
    where
        F: FnMut(CloseReason) + 'static,
    {
        self.inner.borrow_mut().on_close = Some(Box::new(callback));
    }

    /// Removes the close callback. Future sends are no longer tracked;
    /// a pending close event for an already-sent notification is
    /// swallowed.
    pub fn unbind_close(&self) {
        self.inner.borrow_mut().on_close = None;
    }

    pub(crate) fn has_close_callback(&self) -> bool {
        self.inner.borrow().on_close.is_some()
    }

    /// Adds or replaces an action, returning its key.
    ///
    /// An existing key is replaced in place, keeping its position in
    /// the action list; a new key is appended at the end. With `None`
    /// as the key a unique one is generated. The description shown on
    /// the action button defaults to the key itself.
    pub fn bind_action<F>(
        &self,
        key: Option<&str>,
        description: Option<&str>,
        callback: F,
    ) -> String
    where
        F: FnMut(&str) + 'static,
    {
        let mut inner = self.inner.borrow_mut();

        let key = match key {
            Some(key) => key.to_owned(),
            None => {
                inner.action_key_seq += 1;
                format!("_{:x}", inner.action_key_seq)
            }
        };
        let label = description.unwrap_or(&key).to_owned();

        if let Some(action) = inner.actions.iter_mut().find(|action| action.key == key) {
            action.label = label;
            action.callback = Some(Box::new(callback));
        } else {
            inner.actions.push(Action {
                key: key.clone(),
                label,
                callback: Some(Box::new(callback)),
            });
        }

        key
    }

    /// Deletes an action entirely. Re-binding the same key later
    /// appends it at the end of the action list again. Returns whether
    /// the key was present.
    pub fn unbind_action(&self, key: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let len_before = inner.actions.len();
        inner.actions.retain(|action| action.key != key);
        inner.actions.len() != len_before
    }
}

/// Fires the close callback, if any. The callback is taken out of the
/// notification for the duration of the call, so it may freely use the
/// handle it captured.
pub(crate) fn emit_closed(notification: &Notification, reason: CloseReason) {
    let taken = notification.inner.borrow_mut().on_close.take();
    let Some(mut callback) = taken else { return };
    callback(reason);

    // restore for the next send cycle unless the callback rebound itself
    let mut inner = notification.inner.borrow_mut();
    if inner.on_close.is_none() {
        inner.on_close = Some(callback);
    }
}

fn invoke_action(notification: &Notification, key: &str) {
    let taken = notification
        .inner
        .borrow_mut()
        .actions
        .iter_mut()
        .find(|action| action.key == key)
        .and_then(|action| action.callback.take());
    let Some(mut callback) = taken else {
        debug!(key, "no matching action for invoked key");
        return;
    };
    callback(key);

    let mut inner = notification.inner.borrow_mut();
    if let Some(action) = inner.actions.iter_mut().find(|action| action.key == key) {
        if action.callback.is_none() {
            action.callback = Some(callback);
        }
    }
}

impl Session {
    /// Runs one bounded wait-and-process cycle on the connection.
    ///
    /// Blocks for at most `timeout` (`None` blocks indefinitely), then
    /// drains every queued incoming message, firing close/action
    /// callbacks for signals that refer to tracked notifications. A
    /// connection that reports itself disconnected is torn down first,
    /// with the usual registry drain.
    ///
    /// Returning [`DispatchStatus::Done`] means tracked notifications
    /// remain and the caller should keep pumping;
    /// [`DispatchStatus::NotConnected`] is returned without blocking
    /// and may be treated like [`DispatchStatus::AllClosed`].
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> DispatchStatus {
        let stale = self
            .conn
            .as_ref()
            .is_some_and(|conn| !conn.channel().is_connected());
        if stale {
            self.disconnect();
        }
        if self.conn.is_none() {
            return DispatchStatus::NotConnected;
        }

        if let Some(conn) = &self.conn {
            let _ = conn.channel().read_write(timeout);
        }
        loop {
            let msg = self
                .conn
                .as_ref()
                .and_then(|conn| conn.channel().pop_message());
            match msg {
                Some(msg) => self.handle_signal(&msg),
                None => break,
            }
        }

        if self.tracked.is_empty() {
            DispatchStatus::AllClosed
        } else {
            DispatchStatus::Done
        }
    }

    fn handle_signal(&mut self, msg: &Message) {
        if msg.msg_type() != MessageType::Signal {
            return;
        }
        let Some(interface) = msg.interface() else {
            return;
        };
        if &*interface != bus::NOTIFICATIONS_DBUS_INTERFACE {
            return;
        }
        let Some(member) = msg.member() else { return };

        match &*member {
            bus::MEMBER_NOTIFICATION_CLOSED => {
                let (id, reason) = match msg.read2::<u32, u32>() {
                    Ok(args) => args,
                    Err(err) => {
                        warn!(%err, "malformed NotificationClosed signal");
                        return;
                    }
                };
                self.notification_closed(id, CloseReason::from_wire(reason));
            }
            bus::MEMBER_ACTION_INVOKED => {
                let (id, key) = match msg.read2::<u32, String>() {
                    Ok(args) => args,
                    Err(err) => {
                        warn!(%err, "malformed ActionInvoked signal");
                        return;
                    }
                };
                self.action_invoked(id, &key);
            }
            other => {
                warn!(member = other, "unexpected signal on the notifications interface");
                debug_assert!(false, "unexpected notifications signal: {other}");
            }
        }
    }

    fn notification_closed(&mut self, id: u32, reason: CloseReason) {
        let Some(index) = self
            .tracked
            .iter()
            .position(|notification| notification.message_id() == id)
        else {
            debug!(id, "ignoring close event for an untracked notification");
            return;
        };

        let notification = self.tracked.remove(index);
        emit_closed(&notification, reason);
    }

    fn action_invoked(&mut self, id: u32, key: &str) {
        let Some(notification) = self
            .tracked
            .iter()
            .find(|notification| notification.message_id() == id)
            .cloned()
        else {
            debug!(id, "ignoring action event for an untracked notification");
            return;
        };

        invoke_action(&notification, key);
    }
}
