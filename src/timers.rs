use std::time::Duration;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TimerId(u64);

/// Something that happens when a timer fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TimerTask {
    /// Remove the transition class from a slide we navigated away from.
    ClearLeaving { slide: usize },

    /// Reveal an element that was hidden when its slide became active.
    Reveal { slide: usize, element: crate::deck::element::ElementPath, reveal: Reveal },

    /// Start cycling the rotating label.
    StartRotation,

    /// Fade the rotating label out before switching it.
    RotateLabel,

    /// Switch the rotating label to the given cycle entry and fade it back in.
    SwapLabel { index: usize },

    /// Restart the rotation after an export restored its slide.
    RearmRotation { slide: usize },

    /// Start typing the typewriter text.
    StartTypewriter,

    /// Type the next typewriter character.
    TypeNext,

    /// Hide the typewriter cursor.
    HideTypewriterCursor,

    /// The scroll wheel stopped moving.
    WheelSettled { forward: bool },

    /// Slide the notification into view.
    ShowNotification { id: u64 },

    /// Slide the notification out of view.
    HideNotification { id: u64 },

    /// Drop the notification.
    RemoveNotification { id: u64 },

    /// The slide being exported had time to settle and can be captured.
    CaptureSettled,
}

/// The way an element is revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reveal {
    Card,
    FlowStep,
    FlowArrow,
}

#[derive(Debug)]
struct Timer {
    id: TimerId,
    deadline: Duration,
    period: Option<Duration>,
    task: TimerTask,
}

/// A queue of timers measured against an externally provided clock.
///
/// The scheduler never looks at the wall clock: callers pass the current time, measured from
/// whatever origin they picked, which keeps everything driven by it deterministic.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    timers: Vec<Timer>,
    next_id: u64,
}

impl Scheduler {
    /// Schedule a task to run once after a delay.
    pub(crate) fn once(&mut self, now: Duration, delay: Duration, task: TimerTask) -> TimerId {
        self.push(now + delay, None, task)
    }

    /// Schedule a task to run periodically, the first time after one period.
    ///
    /// Periods are at least one millisecond long.
    pub(crate) fn every(&mut self, now: Duration, period: Duration, task: TimerTask) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.push(now + period, Some(period), task)
    }

    fn push(&mut self, deadline: Duration, period: Option<Duration>, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer { id, deadline, period, task });
        id
    }

    /// Cancel a timer. Returns whether it was still scheduled.
    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        before != self.timers.len()
    }

    pub(crate) fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id)
    }

    /// The earliest deadline among all timers.
    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|timer| timer.deadline).min()
    }

    /// Pops the earliest timer that is due at the given time.
    ///
    /// Periodic timers are rescheduled for their next period rather than removed. Ties are broken
    /// by scheduling order.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(TimerId, TimerTask)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by_key(|(_, timer)| (timer.deadline, timer.id))
            .map(|(index, _)| index)?;
        let timer = &mut self.timers[index];
        match timer.period {
            Some(period) => {
                timer.deadline += period;
                Some((timer.id, timer.task.clone()))
            }
            None => {
                let timer = self.timers.swap_remove(index);
                Some((timer.id, timer.task))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}
