use std::fmt;
use std::time::{Duration, Instant};

/// Per-frame stages of the watermark pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Composite,
    Encode,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Decode, Stage::Composite, Stage::Encode];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Stage::Decode => "decode",
            Stage::Composite => "composite",
            Stage::Encode => "encode",
        })
    }
}

/// Observer for pipeline progress and timing.
///
/// Lets the CLI report progress without the use case knowing where the
/// output goes.
pub trait PipelineLogger: Send {
    /// Report that `current` of `total` frames are done. `total` is 0 when
    /// the container does not know its frame count.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long one stage took for one frame.
    fn timing(&mut self, stage: Stage, duration: Duration);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events. Used by tests and library callers that do their own
/// reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: Stage, _duration: Duration) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
struct StageTotals {
    count: usize,
    total: Duration,
}

/// Logs throttled progress through the `log` crate and accumulates stage
/// timings for a closing summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    stages: [StageTotals; 3],
    start_time: Instant,
    frames_done: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: [StageTotals::default(); 3],
            start_time: Instant::now(),
            frames_done: 0,
        }
    }

    /// Mean duration of a stage in milliseconds, if it was ever timed.
    pub fn average_ms(&self, stage: Stage) -> Option<f64> {
        let totals = self.stages[stage.slot()];
        (totals.count > 0).then(|| totals.total.as_secs_f64() * 1000.0 / totals.count as f64)
    }

    /// Returns the formatted summary, or `None` if nothing was timed.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.iter().all(|s| s.count == 0) {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let frames = self.frames_done;
        let mut lines = vec![format!(
            "Watermark summary ({frames} frames, {elapsed:.1}s total):"
        )];

        for stage in Stage::ALL {
            let totals = self.stages[stage.slot()];
            let Some(avg_ms) = self.average_ms(stage) else {
                continue;
            };
            let total_ms = totals.total.as_secs_f64() * 1000.0;
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.2}ms  total {total_ms:7.0}ms"
            ));
        }

        if frames > 0 && elapsed > 0.0 {
            lines.push(format!("  Throughput: {:.1} fps", frames as f64 / elapsed));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_done = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, stage: Stage, duration: Duration) {
        let totals = &mut self.stages[stage.slot()];
        totals.count += 1;
        totals.total += duration;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
