use crate::timers::{Scheduler, TimerTask};
use std::time::Duration;

const NOTIFICATION_SHOW_DELAY: Duration = Duration::from_millis(100);
const NOTIFICATION_REMOVE_DELAY: Duration = Duration::from_millis(300);

const OVERLAY_TITLE: &str = "Creating PDF...";
const OVERLAY_INITIAL_TEXT: &str = "Preparing...";
const OVERLAY_TIP: &str = "Tip: exporting may take a few seconds.";

/// Everything shown around the slide itself.
#[derive(Debug)]
pub(crate) struct Chrome {
    current: usize,
    total: usize,
    overlay: Option<ExportOverlay>,
    notifications: Vec<Notification>,
    notification_duration: Duration,
    next_notification_id: u64,
    fullscreen: bool,
}

impl Chrome {
    pub(crate) fn new(total: usize, notification_duration: Duration) -> Self {
        Self {
            current: 1,
            total,
            overlay: None,
            notifications: Vec::new(),
            notification_duration,
            next_notification_id: 0,
            fullscreen: false,
        }
    }

    /// Point the counters, buttons and dots at a slide.
    pub(crate) fn update(&mut self, current: usize) {
        self.current = current;
    }

    pub(crate) fn current(&self) -> usize {
        self.current
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    /// The `current / total` counter text.
    pub(crate) fn counter(&self) -> String {
        format!("{} / {}", self.current, self.total)
    }

    pub(crate) fn previous_disabled(&self) -> bool {
        self.current == 1
    }

    pub(crate) fn next_disabled(&self) -> bool {
        self.current == self.total
    }

    /// One entry per slide, `true` for the active one.
    pub(crate) fn dots(&self) -> impl Iterator<Item = bool> + '_ {
        (1..=self.total).map(|slide| slide == self.current)
    }

    /// The presentation progress, as a percentage.
    pub(crate) fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.current as f64 / self.total as f64 * 100.0
    }

    pub(crate) fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub(crate) fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    pub(crate) fn show_overlay(&mut self) {
        self.overlay = Some(ExportOverlay {
            title: OVERLAY_TITLE,
            percentage: 0.0,
            text: OVERLAY_INITIAL_TEXT.into(),
            tip: OVERLAY_TIP,
        });
    }

    pub(crate) fn update_overlay(&mut self, percentage: f64, text: String) {
        if let Some(overlay) = &mut self.overlay {
            overlay.percentage = percentage;
            overlay.text = text;
        }
    }

    pub(crate) fn hide_overlay(&mut self) {
        self.overlay = None;
    }

    pub(crate) fn overlay(&self) -> Option<&ExportOverlay> {
        self.overlay.as_ref()
    }

    /// Create a notification. It shows up shortly after and goes away on its own.
    pub(crate) fn notify(&mut self, timers: &mut Scheduler, now: Duration, message: String, kind: NotificationKind) {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(Notification { id, message, kind, visible: false });
        timers.once(now, NOTIFICATION_SHOW_DELAY, TimerTask::ShowNotification { id });
        timers.once(now, self.notification_duration, TimerTask::HideNotification { id });
    }

    pub(crate) fn show_notification(&mut self, id: u64) {
        if let Some(notification) = self.notifications.iter_mut().find(|n| n.id == id) {
            notification.visible = true;
        }
    }

    pub(crate) fn hide_notification(&mut self, timers: &mut Scheduler, now: Duration, id: u64) {
        if let Some(notification) = self.notifications.iter_mut().find(|n| n.id == id) {
            notification.visible = false;
            timers.once(now, NOTIFICATION_REMOVE_DELAY, TimerTask::RemoveNotification { id });
        }
    }

    pub(crate) fn remove_notification(&mut self, id: u64) {
        self.notifications.retain(|n| n.id != id);
    }

    pub(crate) fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}

/// The overlay shown while exporting.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ExportOverlay {
    pub(crate) title: &'static str,
    pub(crate) percentage: f64,
    pub(crate) text: String,
    pub(crate) tip: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NotificationKind {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Notification {
    pub(crate) id: u64,
    pub(crate) message: String,
    pub(crate) kind: NotificationKind,
    pub(crate) visible: bool,
}
