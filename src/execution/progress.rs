//! Synthetic progress for an in-flight run.
//!
//! The service reports no progress, so a repeating task emits ticks on a
//! fixed cadence and each tick bumps the value by a fixed step, never reaching
//! 100 on its own. Only `complete()` shows 100.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::{LifecycleEvent, RunId};

/// Highest value the cadence may reach.
const MAX_CAP: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    pub step: u8,
    pub interval: Duration,
    pub cap: u8,
}

impl ProgressSettings {
    /// Clamps to a usable range: step >= 1, cap <= 99, interval >= 1ms.
    pub fn new(step: u8, interval: Duration, cap: u8) -> Self {
        Self {
            step: step.max(1),
            interval: interval.max(Duration::from_millis(1)),
            cap: cap.min(MAX_CAP),
        }
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50), 95)
    }
}

#[derive(Debug)]
pub struct ProgressPresenter {
    settings: ProgressSettings,
    value: u8,
    active_run: Option<RunId>,
    cadence: Option<JoinHandle<()>>,
}

impl ProgressPresenter {
    pub fn new(settings: ProgressSettings) -> Self {
        Self {
            settings,
            value: 0,
            active_run: None,
            cadence: None,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn settings(&self) -> ProgressSettings {
        self.settings
    }

    pub fn is_ticking(&self) -> bool {
        self.cadence.is_some()
    }

    /// Reset to 0 and start a fresh cadence for `run`. Any previous cadence is
    /// cancelled first.
    pub fn start(&mut self, run: RunId, events: UnboundedSender<LifecycleEvent>) {
        self.reset();
        self.active_run = Some(run);

        let interval = self.settings.interval;
        self.cadence = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick of `interval` fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if events.send(LifecycleEvent::ProgressTick { run }).is_err() {
                    break;
                }
            }
        }));
        tracing::trace!(run, ?interval, "progress cadence started");
    }

    /// Apply one tick. Ticks for any run other than the active one are dropped,
    /// which covers ticks still queued after `complete()`.
    pub fn advance(&mut self, run: RunId) {
        if self.active_run != Some(run) {
            return;
        }
        let cap = self.settings.cap;
        if self.value < cap {
            self.value = self.value.saturating_add(self.settings.step).min(cap);
        }
    }

    /// Jump to 100 and stop the cadence.
    pub fn complete(&mut self) {
        self.stop_cadence();
        self.active_run = None;
        self.value = 100;
    }

    pub fn reset(&mut self) {
        self.stop_cadence();
        self.active_run = None;
        self.value = 0;
    }

    fn stop_cadence(&mut self) {
        if let Some(handle) = self.cadence.take() {
            handle.abort();
            tracing::trace!("progress cadence stopped");
        }
    }
}

impl Default for ProgressPresenter {
    fn default() -> Self {
        Self::new(ProgressSettings::default())
    }
}

impl Drop for ProgressPresenter {
    fn drop(&mut self) {
        self.stop_cadence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn presenter(step: u8, cap: u8) -> ProgressPresenter {
        ProgressPresenter::new(ProgressSettings::new(step, Duration::from_millis(50), cap))
    }

    #[test]
    fn settings_are_clamped() {
        let s = ProgressSettings::new(0, Duration::ZERO, 150);
        assert_eq!(s.step, 1);
        assert_eq!(s.cap, 99);
        assert_eq!(s.interval, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn advance_is_monotonic_and_capped_below_100() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut p = presenter(7, 95);
        p.start(1, tx);
        assert_eq!(p.value(), 0);

        let mut last = 0;
        for _ in 0..50 {
            p.advance(1);
            assert!(p.value() >= last);
            assert!(p.value() < 100);
            last = p.value();
        }
        assert_eq!(p.value(), 95);
    }

    #[tokio::test]
    async fn complete_forces_100_and_stops_cadence() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut p = presenter(5, 95);
        p.start(3, tx);
        p.advance(3);
        assert!(p.is_ticking());

        p.complete();
        assert_eq!(p.value(), 100);
        assert!(!p.is_ticking());

        // A tick already queued for run 3 must not move the bar.
        p.advance(3);
        assert_eq!(p.value(), 100);
    }

    #[tokio::test]
    async fn start_resets_previous_value() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut p = presenter(5, 95);
        p.start(1, tx.clone());
        p.advance(1);
        p.complete();

        p.start(2, tx);
        assert_eq!(p.value(), 0);
        p.advance(1);
        assert_eq!(p.value(), 0);
        p.advance(2);
        assert_eq!(p.value(), 5);

        p.reset();
        assert_eq!(p.value(), 0);
        assert!(!p.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_emits_ticks_for_its_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut p = presenter(5, 95);
        p.start(9, tx);

        for _ in 0..3 {
            match rx.recv().await {
                Some(LifecycleEvent::ProgressTick { run }) => p.advance(run),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(p.value(), 15);

        p.complete();
        tokio::time::sleep(Duration::from_millis(500)).await;
        // The aborted cadence dropped its sender; at most one tick raced the abort.
        let mut late = 0;
        while let Ok(ev) = rx.try_recv() {
            assert!(matches!(ev, LifecycleEvent::ProgressTick { run: 9 }));
            late += 1;
        }
        assert!(late <= 1);
        assert_eq!(p.value(), 100);
    }
}
