//! Streaming flow control: buffering, flush heuristics, and bounded-window
//! rendering.
//!
//! The controller consumes a fragment stream, holding incoming text in a
//! small pending buffer. A flush renders the *accumulated* text (clamped to
//! a trailing display window), not just the pending fragment, so the visible
//! surface always reflects the response so far. On completion a distinct
//! final render applies head+tail preservation, and the full untruncated
//! text is handed back for history folding.
//!
//! Flush decisions run synchronously between fragment arrivals; the time
//! threshold is only consulted when the next fragment arrives, so actual
//! flush latency can exceed the nominal threshold on sparse streams.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tracing::trace;

use crate::error::ChatError;
use crate::stream::window;
use crate::types::{FragmentStream, StreamEvent, Usage};

/// Flow controller thresholds.
///
/// Constructed per session so concurrent sessions tune independently.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Pending size that always flushes.
    pub flush_size: usize,
    /// Pending floor for a sentence-boundary flush.
    pub sentence_floor: usize,
    /// Pending floor for a time-based flush.
    pub min_flush: usize,
    /// Elapsed time since the last flush for a time-based flush.
    pub flush_interval: Duration,
    /// Pending floor for a pause-marker flush.
    pub pause_floor: usize,
    /// How many trailing characters to inspect for a pause marker.
    pub pause_lookback: usize,
    /// Visible character budget for the display surface.
    pub visible_budget: usize,
    /// Trailing window size used once the budget is exceeded mid-stream.
    pub scroll_window: usize,
    /// Head size preserved by the final render.
    pub head_budget: usize,
    /// How far into a window to look for a sentence start.
    pub align_scan: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            flush_size: 50,
            sentence_floor: 20,
            min_flush: 10,
            flush_interval: Duration::from_millis(200),
            pause_floor: 30,
            pause_lookback: 4,
            visible_budget: 8_000,
            scroll_window: 4_000,
            head_budget: 2_000,
            align_scan: 200,
        }
    }
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_flush_size(mut self, flush_size: usize) -> Self {
        self.flush_size = flush_size;
        self
    }

    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub const fn with_visible_budget(mut self, budget: usize) -> Self {
        self.visible_budget = budget;
        self
    }

    pub const fn with_scroll_window(mut self, window: usize) -> Self {
        self.scroll_window = window;
        self
    }

    pub const fn with_head_budget(mut self, head: usize) -> Self {
        self.head_budget = head;
        self
    }
}

/// Which heuristic triggered a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Pending buffer reached the size threshold.
    Size,
    /// Sentence end seen past the sentence floor.
    Sentence,
    /// Time threshold elapsed with enough pending text.
    Interval,
    /// Pause marker seen past the pause floor.
    Pause,
    /// Safety valve against unbounded pending growth.
    Overflow,
}

/// First matching flush condition, checked in priority order.
pub fn flush_trigger(
    pending: &str,
    pending_chars: usize,
    elapsed: Duration,
    config: &FlowConfig,
) -> Option<FlushReason> {
    if pending_chars >= config.flush_size {
        return Some(FlushReason::Size);
    }
    if pending_chars >= config.sentence_floor && window::contains_sentence_marker(pending) {
        return Some(FlushReason::Sentence);
    }
    if elapsed >= config.flush_interval && pending_chars >= config.min_flush {
        return Some(FlushReason::Interval);
    }
    if pending_chars >= config.pause_floor
        && window::tail_has_pause_marker(pending, config.pause_lookback)
    {
        return Some(FlushReason::Pause);
    }
    if pending_chars >= config.flush_size * 2 {
        return Some(FlushReason::Overflow);
    }
    None
}

/// Receives rendered text from the flow controller.
pub trait RenderSink {
    /// Mid-stream flush: the accumulated text clamped to the display window.
    fn render(&mut self, visible: &str);

    /// Final render after the stream completes, head+tail shaped when the
    /// text exceeds the visible budget.
    fn finish(&mut self, display: &str);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _visible: &str) {}
    fn finish(&mut self, _display: &str) {}
}

/// Result of a completed stream.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Full accumulated text — the value folded into history, never the
    /// truncated display form.
    pub text: String,
    /// Usage counts, when the service reported them.
    pub usage: Option<Usage>,
}

/// A stream that failed mid-flight, with whatever text had accumulated.
#[derive(Debug)]
pub struct StreamAborted {
    pub partial: String,
    pub usage: Option<Usage>,
    pub error: ChatError,
}

/// Buffering state machine driving one streaming response.
pub struct FlowController<'a, S: RenderSink + ?Sized> {
    config: FlowConfig,
    sink: &'a mut S,
    pending: String,
    pending_chars: usize,
    accumulated: String,
    last_flush: Instant,
    usage: Option<Usage>,
}

impl<'a, S: RenderSink + ?Sized> FlowController<'a, S> {
    pub fn new(config: FlowConfig, sink: &'a mut S) -> Self {
        Self {
            config,
            sink,
            pending: String::new(),
            pending_chars: 0,
            accumulated: String::new(),
            last_flush: Instant::now(),
            usage: None,
        }
    }

    /// Drives the stream to completion.
    ///
    /// On a mid-flight error the loop aborts and the accumulated text is
    /// surfaced alongside the error rather than discarded.
    pub async fn consume(
        mut self,
        mut stream: FragmentStream,
    ) -> Result<StreamOutcome, StreamAborted> {
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamEvent::Content { delta }) => {
                    self.pending_chars += delta.chars().count();
                    self.pending.push_str(&delta);
                    self.accumulated.push_str(&delta);
                    let elapsed = self.last_flush.elapsed();
                    if let Some(reason) =
                        flush_trigger(&self.pending, self.pending_chars, elapsed, &self.config)
                    {
                        self.flush(reason);
                    }
                }
                Ok(StreamEvent::UsageUpdate { usage }) => {
                    self.usage = Some(usage);
                }
                Err(error) => {
                    return Err(StreamAborted {
                        partial: self.accumulated,
                        usage: self.usage,
                        error,
                    });
                }
            }
        }

        let display = window::shape_final(
            &self.accumulated,
            self.config.visible_budget,
            self.config.head_budget,
            self.config.align_scan,
        );
        self.sink.finish(&display);

        Ok(StreamOutcome {
            text: self.accumulated,
            usage: self.usage,
        })
    }

    fn flush(&mut self, reason: FlushReason) {
        trace!(?reason, pending = self.pending_chars, "flushing stream buffer");
        let visible = window::trailing_window(
            &self.accumulated,
            self.config.visible_budget,
            self.config.scroll_window,
            self.config.align_scan,
        );
        self.sink.render(visible);
        self.pending.clear();
        self.pending_chars = 0;
        self.last_flush = Instant::now();
    }
}
