//! In-memory notification content and the operations that push it to
//! the server.

use std::cell::RefCell;
use std::fmt;
use std::fmt::Display;
use std::rc::Rc;
use std::time::Duration;

use dbus::arg::{ArgType, PropMap, Variant};
use dbus::Message;

use crate::bus;
use crate::error::Error;
use crate::event::{Action, CloseReason};
use crate::format;
use crate::session::Session;

/// Urgency levels defined by the notifications protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low = 0,
    Normal = 1,
    Critical = 2,
}

/// App-icon value that explicitly disables the icon instead of falling
/// back to the session default (which is what a cleared icon does).
pub const NO_APP_ICON: &str = "";

/// Expire on the server's default timeout.
pub const DEFAULT_EXPIRE_TIMEOUT: i32 = -1;

/// Never expire.
pub const NO_EXPIRE_TIMEOUT: i32 = 0;

/// Reserved action key for the default action of a notification.
pub const DEFAULT_ACTION: &str = "default";

pub(crate) const NO_MESSAGE_ID: u32 = 0;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Largest wait libdbus can express in its millisecond argument;
/// effectively unbounded.
const NOTIFY_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

pub(crate) struct Inner {
    pub(crate) summary: String,
    pub(crate) body: Option<String>,
    pub(crate) formatted: bool,
    pub(crate) app_icon: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) urgency: Option<Urgency>,
    pub(crate) expire_timeout: i32,
    pub(crate) message_id: u32,
    pub(crate) on_close: Option<Box<dyn FnMut(CloseReason)>>,
    pub(crate) actions: Vec<Action>,
    pub(crate) action_key_seq: u32,
}

/// A single desktop notification, sendable through any [`Session`].
///
/// The handle is cheap to clone and shares the underlying notification;
/// a session's registry holds such clones while a close event is
/// pending, so dropping your own handle after a send leaves the
/// notification alive exactly until it closes. The type is not `Send`;
/// all use stays on one thread.
#[derive(Clone)]
pub struct Notification {
    pub(crate) inner: Rc<RefCell<Inner>>,
}

impl Notification {
    /// Creates a notification whose summary and body are positional
    /// templates, rendered jointly against the arguments passed to
    /// [`send`](Self::send) or [`update`](Self::update).
    ///
    /// Panics if `summary` is empty.
    pub fn new(summary: &str, body: Option<&str>) -> Self {
        Self::with_formatting(summary, body, true)
    }

    /// Creates a notification whose summary and body are literal text.
    ///
    /// Panics if `summary` is empty.
    pub fn new_unformatted(summary: &str, body: Option<&str>) -> Self {
        Self::with_formatting(summary, body, false)
    }

    fn with_formatting(summary: &str, body: Option<&str>, formatted: bool) -> Self {
        assert!(!summary.is_empty(), "notification summary must not be empty");

        Notification {
            inner: Rc::new(RefCell::new(Inner {
                summary: summary.to_owned(),
                body: body.map(str::to_owned),
                formatted,
                app_icon: None,
                category: None,
                urgency: None,
                expire_timeout: DEFAULT_EXPIRE_TIMEOUT,
                message_id: NO_MESSAGE_ID,
                on_close: None,
                actions: Vec::new(),
                action_key_seq: 0,
            })),
        }
    }

    /// Panics if `summary` is empty.
    pub fn set_summary(&self, summary: &str) {
        assert!(!summary.is_empty(), "notification summary must not be empty");
        self.inner.borrow_mut().summary = summary.to_owned();
    }

    pub fn set_body(&self, body: Option<&str>) {
        self.inner.borrow_mut().body = body.map(str::to_owned);
    }

    /// Switches between template and literal interpretation of the
    /// summary and body.
    pub fn set_formatted(&self, formatted: bool) {
        self.inner.borrow_mut().formatted = formatted;
    }

    /// Overrides the session's default icon for this notification.
    /// `None` restores the default lookup; [`NO_APP_ICON`] suppresses
    /// the icon entirely.
    pub fn set_app_icon(&self, app_icon: Option<&str>) {
        self.inner.borrow_mut().app_icon = app_icon.map(str::to_owned);
    }

    pub fn set_category(&self, category: Option<&str>) {
        self.inner.borrow_mut().category = category.map(str::to_owned);
    }

    pub fn set_urgency(&self, urgency: Option<Urgency>) {
        self.inner.borrow_mut().urgency = urgency;
    }

    /// Timeout in milliseconds; [`DEFAULT_EXPIRE_TIMEOUT`] leaves it to
    /// the server, [`NO_EXPIRE_TIMEOUT`] keeps the notification up until
    /// it is closed.
    pub fn set_expire_timeout(&self, expire_timeout: i32) {
        self.inner.borrow_mut().expire_timeout = expire_timeout;
    }

    /// The bus-assigned id, or `None` while the notification is not
    /// currently displayed.
    pub fn id(&self) -> Option<u32> {
        match self.inner.borrow().message_id {
            NO_MESSAGE_ID => None,
            id => Some(id),
        }
    }

    pub(crate) fn message_id(&self) -> u32 {
        self.inner.borrow().message_id
    }

    pub(crate) fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Sends the notification as a new one, forgetting any previous
    /// server-side identity first. Equivalent to [`update`](Self::update)
    /// on a never-sent notification.
    pub fn send(&self, session: &mut Session, args: &[&dyn Display]) -> Result<(), Error> {
        self.inner.borrow_mut().message_id = NO_MESSAGE_ID;
        self.update(session, args)
    }

    /// Sends the notification, replacing the currently displayed one if
    /// it is already up.
    ///
    /// Connects the session if necessary, renders the templates when
    /// formatting is enabled, performs the `Notify` round-trip, then
    /// stores the returned id and registers the notification with the
    /// session when a close callback is bound. The outcome is recorded
    /// on the session either way.
    pub fn update(&self, session: &mut Session, args: &[&dyn Display]) -> Result<(), Error> {
        session.connect()?;

        let msg = {
            let inner = self.inner.borrow();

            let app_name = session.app_name().unwrap_or("").to_owned();
            let app_icon = inner
                .app_icon
                .as_deref()
                .or(session.app_icon())
                .unwrap_or("")
                .to_owned();

            let (summary, body) = if inner.formatted {
                match inner.body.as_deref() {
                    Some(body) => format::render_pair(&inner.summary, body, args),
                    None => {
                        let mut cursor = 0;
                        (format::render(&inner.summary, args, &mut cursor), String::new())
                    }
                }
            } else {
                (inner.summary.clone(), inner.body.clone().unwrap_or_default())
            };

            let actions: Vec<&str> = inner
                .actions
                .iter()
                .flat_map(|action| [action.key.as_str(), action.label.as_str()])
                .collect();

            let mut hints = PropMap::new();
            if let Some(urgency) = inner.urgency {
                hints.insert("urgency".to_owned(), Variant(Box::new(urgency as u8)));
            }
            if let Some(category) = &inner.category {
                hints.insert("category".to_owned(), Variant(Box::new(category.clone())));
            }

            let msg = match Message::new_method_call(
                bus::NOTIFICATIONS_DBUS_NAME,
                bus::NOTIFICATIONS_DBUS_OBJECT,
                bus::NOTIFICATIONS_DBUS_INTERFACE,
                bus::MEMBER_NOTIFY,
            ) {
                Ok(msg) => msg,
                Err(err) => return Err(session.record(Error::DbusSend(err))),
            };

            msg.append3(app_name.as_str(), inner.message_id, app_icon.as_str())
                .append3(summary.as_str(), body.as_str(), actions)
                .append2(hints, inner.expire_timeout)
        };

        let reply = session.call_blocking(msg, NOTIFY_TIMEOUT)?;
        let id: u32 = match reply.read1() {
            Ok(id) => id,
            Err(err) => return Err(session.record(Error::InvalidReply(err.to_string()))),
        };

        self.inner.borrow_mut().message_id = id;
        session.track(self)?;
        session.record_ok();
        Ok(())
    }

    /// Asks the server to close the currently displayed notification.
    ///
    /// Fails with [`Error::NoNotificationId`], without touching the
    /// bus, when the notification is not up. On success the id is
    /// cleared and the session stops tracking the notification; the
    /// close was confirmed synchronously, so no close event follows.
    pub fn close(&self, session: &mut Session) -> Result<(), Error> {
        let id = self.inner.borrow().message_id;
        if id == NO_MESSAGE_ID {
            return Err(session.record(Error::NoNotificationId));
        }

        session.connect()?;

        let msg = match Message::new_method_call(
            bus::NOTIFICATIONS_DBUS_NAME,
            bus::NOTIFICATIONS_DBUS_OBJECT,
            bus::NOTIFICATIONS_DBUS_INTERFACE,
            bus::MEMBER_CLOSE_NOTIFICATION,
        ) {
            Ok(msg) => msg.append1(id),
            Err(err) => return Err(session.record(Error::DbusSend(err))),
        };

        let reply = session.call_blocking(msg, CLOSE_TIMEOUT)?;
        if reply.iter_init().arg_type() != ArgType::Invalid {
            return Err(session.record(Error::InvalidReply(
                "CloseNotification reply carries unexpected arguments".to_owned(),
            )));
        }

        self.inner.borrow_mut().message_id = NO_MESSAGE_ID;
        session.untrack(self);
        session.record_ok();
        Ok(())
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Notification")
            .field("summary", &inner.summary)
            .field("message_id", &inner.message_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    #[should_panic(expected = "summary must not be empty")]
    fn test_empty_summary_panics() {
        let _ = Notification::new("", None);
    }

    #[test]
    fn test_new_starts_undisplayed() {
        let notification = Notification::new("hi", Some("there"));
        assert_eq!(notification.id(), None);
    }

    #[test]
    fn test_setters_replace_and_clear() {
        let notification = Notification::new_unformatted("hi", None);
        notification.set_body(Some("body"));
        notification.set_category(Some("email.arrived"));
        notification.set_urgency(Some(Urgency::Critical));
        notification.set_expire_timeout(NO_EXPIRE_TIMEOUT);

        {
            let inner = notification.inner.borrow();
            assert_eq!(inner.body.as_deref(), Some("body"));
            assert_eq!(inner.category.as_deref(), Some("email.arrived"));
            assert_eq!(inner.urgency, Some(Urgency::Critical));
            assert_eq!(inner.expire_timeout, NO_EXPIRE_TIMEOUT);
        }

        notification.set_body(None);
        notification.set_category(None);
        notification.set_urgency(None);

        let inner = notification.inner.borrow();
        assert!(inner.body.is_none());
        assert!(inner.category.is_none());
        assert!(inner.urgency.is_none());
    }

    #[test]
    fn test_close_without_id_is_rejected_before_io() {
        let mut session = Session::new(None, None);
        let notification = Notification::new("hi", None);

        let error = notification.close(&mut session).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NoNotificationId);
        // no connection attempt was made
        assert!(session.conn.is_none());
        assert_eq!(
            session.last_error().map(Error::kind),
            Some(ErrorKind::NoNotificationId)
        );
    }

    #[test]
    fn test_clone_shares_state() {
        let notification = Notification::new("hi", None);
        let alias = notification.clone();
        alias.set_body(Some("shared"));
        assert_eq!(notification.inner.borrow().body.as_deref(), Some("shared"));
    }
}
