use dbus::message::MatchRule;

pub const NOTIFICATIONS_DBUS_NAME: &str = "org.freedesktop.Notifications";
pub const NOTIFICATIONS_DBUS_OBJECT: &str = "/org/freedesktop/Notifications";
pub const NOTIFICATIONS_DBUS_INTERFACE: &str = "org.freedesktop.Notifications";

pub const MEMBER_NOTIFY: &str = "Notify";
pub const MEMBER_CLOSE_NOTIFICATION: &str = "CloseNotification";
pub const MEMBER_NOTIFICATION_CLOSED: &str = "NotificationClosed";
pub const MEMBER_ACTION_INVOKED: &str = "ActionInvoked";

/// Match rules for the two signals the notification server emits.
pub fn signal_match_rules() -> [MatchRule<'static>; 2] {
    [
        MatchRule::new_signal(NOTIFICATIONS_DBUS_INTERFACE, MEMBER_NOTIFICATION_CLOSED),
        MatchRule::new_signal(NOTIFICATIONS_DBUS_INTERFACE, MEMBER_ACTION_INVOKED),
    ]
}
