//! Rate-limited status edits while the encoder runs.

use crate::domain::av::progress::{
    estimate_eta, format_duration, progress_bar, progress_percent, seconds_to_time,
    ProgressSample, UpdateThrottle,
};
use crate::domain::jobs::MessageRef;
use crate::ports::chat::ChatPort;
use std::time::{Duration, Instant};
use tracing::debug;

/// Edit a status message, logging instead of failing.
pub(crate) async fn update_status<C: ChatPort + ?Sized>(chat: &C, status: MessageRef, text: &str) {
    if let Err(e) = chat.edit_text(status, text).await {
        debug!(error = %e, chat_id = status.chat_id, "status edit failed");
    }
}

pub struct ProgressReporter<'a, C: ?Sized> {
    chat: &'a C,
    status: MessageRef,
    total_secs: Option<u64>,
    label: String,
    throttle: UpdateThrottle,
    started: Instant,
    current_secs: u64,
}

impl<'a, C: ChatPort + ?Sized> ProgressReporter<'a, C> {
    /// `total_secs` of `None` disables the percentage display.
    pub fn new(
        chat: &'a C,
        status: MessageRef,
        total_secs: Option<u64>,
        interval: Duration,
        label: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            status,
            total_secs,
            label: label.into(),
            throttle: UpdateThrottle::new(interval),
            started: Instant::now(),
            current_secs: 0,
        }
    }

    pub fn percent(&self) -> f64 {
        match self.total_secs {
            Some(total) => progress_percent(self.current_secs, total),
            None => 0.0,
        }
    }

    pub fn render(&self, now: Instant) -> String {
        let elapsed = now.saturating_duration_since(self.started);
        let Some(total) = self.total_secs else {
            return format!(
                "🎬 Encoding ({})\n⏱ Elapsed {}\nProgress unavailable for this file.",
                self.label,
                format_duration(elapsed.as_secs())
            );
        };

        let percent = self.percent();
        let eta = estimate_eta(elapsed.as_secs_f64(), percent)
            .map(format_duration)
            .unwrap_or_else(|| "--:--".to_string());
        format!(
            "🎬 Encoding ({})\n[{}] {:.1}%\n⏱ {} / {}\n⏳ ETA {}",
            self.label,
            progress_bar(percent),
            percent,
            seconds_to_time(self.current_secs.min(total)),
            seconds_to_time(total),
            eta
        )
    }

    /// First update, never suppressed.
    pub async fn start(&mut self) {
        let now = Instant::now();
        self.throttle.mark(now);
        update_status(self.chat, self.status, &self.render(now)).await;
    }

    pub async fn observe(&mut self, sample: ProgressSample) {
        self.observe_at(sample, Instant::now()).await
    }

    /// Record a sample; the displayed position never moves backwards.
    pub async fn observe_at(&mut self, sample: ProgressSample, now: Instant) {
        self.current_secs = self.current_secs.max(sample.out_time_secs);
        if self.throttle.should_emit(now) {
            update_status(self.chat, self.status, &self.render(now)).await;
        }
    }

    /// Final update at 100%, never suppressed.
    pub async fn finish(&mut self) {
        if let Some(total) = self.total_secs {
            self.current_secs = self.current_secs.max(total);
        }
        let now = Instant::now();
        self.throttle.mark(now);
        update_status(self.chat, self.status, &self.render(now)).await;
    }
}
