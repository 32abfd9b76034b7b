use std::time::{Duration, Instant};

pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

#[derive(Debug, Clone)]
struct Active {
    notification: Notification,
    expires_at: Instant,
}

/// Single-slot overlay. Callers pass `now` so expiry can be driven by a
/// simulated clock.
#[derive(Debug, Clone)]
pub struct Notifications {
    duration: Duration,
    active: Option<Active>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl Notifications {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            active: None,
        }
    }

    pub fn notify(&mut self, notification: Notification, now: Instant) {
        let duration = self.duration;
        self.notify_for(notification, duration, now);
    }

    /// Replaces whatever is showing.
    pub fn notify_for(&mut self, notification: Notification, duration: Duration, now: Instant) {
        self.active = Some(Active {
            notification,
            expires_at: now + duration,
        });
    }

    pub fn current(&self) -> Option<&Notification> {
        self.active.as_ref().map(|active| &active.notification)
    }

    pub fn is_visible(&self) -> bool {
        self.active.is_some()
    }

    /// Clears an expired notification. Returns true if one was cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match &self.active {
            Some(active) if now >= active.expires_at => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn dismiss(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Escape closes the overlay. Returns true if the key was consumed.
    pub fn handle_escape(&mut self) -> bool {
        self.dismiss()
    }
}

/// Blocking sign-in prompt, shown while signed out until dismissed.
#[derive(Debug, Clone, Default)]
pub struct AuthPrompt {
    dismissed: bool,
}

impl AuthPrompt {
    pub fn is_visible(&self, authenticated: bool) -> bool {
        !authenticated && !self.dismissed
    }

    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }

    /// Offers the prompt again, e.g. after signing out.
    pub fn reoffer(&mut self) {
        self.dismissed = false;
    }
}
