//! Thin client for the freedesktop.org Desktop Notifications service.
//!
//! Notifications are plain values, sendable through a [`Session`] that
//! lazily opens its own private session-bus connection. Close and
//! action events come back through [`Session::dispatch`], which the
//! application pumps from its own loop:
//!
//! ```no_run
//! use std::time::Duration;
//! use notibus::{DispatchStatus, Notification, Session};
//!
//! let mut session = Session::new(Some("mailer"), None);
//!
//! let notification = Notification::new("Mail from {}", Some("{} unread messages"));
//! notification.bind_close(|reason| println!("gone: {reason:?}"));
//! notification.bind_action(Some("open"), Some("Open inbox"), |_| println!("opening"));
//! notification.send(&mut session, &[&"alice@example.org", &3])?;
//!
//! while session.dispatch(Some(Duration::from_millis(500))) == DispatchStatus::Done {}
//! # Ok::<(), notibus::Error>(())
//! ```
//!
//! Everything is single-threaded and blocking; the notification and
//! session types are deliberately not `Send`.

mod bus;
mod error;
mod event;
mod format;
mod notification;
mod session;

pub use error::{Error, ErrorKind};
pub use event::{CloseReason, DispatchStatus};
pub use notification::{
    Notification, Urgency, DEFAULT_ACTION, DEFAULT_EXPIRE_TIMEOUT, NO_APP_ICON,
    NO_EXPIRE_TIMEOUT,
};
pub use session::Session;
