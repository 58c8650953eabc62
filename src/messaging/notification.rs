// Notifications - user-facing status messages

use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Which part of the editor raised the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Rejected edits and other sheet feedback
    Sheet,
    /// Loading, saving, import and export
    Store,
    Engine,
    Render,
}

/// Notification with timestamp and metadata
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    /// Unix time in milliseconds
    pub timestamp: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        Self {
            level,
            category,
            message,
            timestamp: now_ms(),
        }
    }

    pub fn info(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

    /// Whether the notification is younger than `max_age_ms`
    pub fn is_recent(&self, max_age_ms: u64) -> bool {
        now_ms().saturating_sub(self.timestamp) < max_age_ms
    }

    /// Forward to the log facade at the matching level
    pub fn log(&self) {
        let target = match self.category {
            NotificationCategory::Sheet => "kunquat_sheet::sheet",
            NotificationCategory::Store => "kunquat_sheet::project",
            NotificationCategory::Engine => "kunquat_sheet::engine",
            NotificationCategory::Render => "kunquat_sheet::view",
        };
        match self.level {
            NotificationLevel::Info => log::info!(target: target, "{}", self.message),
            NotificationLevel::Warning => log::warn!(target: target, "{}", self.message),
            NotificationLevel::Error => log::error!(target: target, "{}", self.message),
        }
    }
}
