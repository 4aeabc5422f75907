use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use roadwatch::PipelineStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Stage spinners and the end-of-run report on stderr.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    fn pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    pub fn report(&self, stats: &PipelineStats, elapsed: Duration) {
        let mean = stats
            .mean_score()
            .map(|m| format!("{:.3}", m))
            .unwrap_or_else(|| "-".to_string());
        let marker = if self.pretty() { "✔" } else { "==>" };
        eprintln!(
            "{marker} {} frames in {}: {} delivered, {} dropped, {} skipped, {} below threshold, mean score {}",
            stats.frames,
            format_duration(elapsed),
            stats.delivered,
            stats.dropped,
            stats.skipped,
            stats.below_threshold,
            mean
        );
    }
}

/// Open stage. Finishes its spinner (or plain line) when dropped.
pub struct StageGuard {
    name: String,
    detail: Option<String>,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            detail: None,
            start: Instant::now(),
            spinner,
        }
    }

    /// What the stage ended up with, e.g. the opened source or the loaded backend.
    pub fn done(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = stage_line(&self.name, self.detail.as_deref(), self.start.elapsed());
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn stage_line(name: &str, detail: Option<&str>, elapsed: Duration) -> String {
    match detail {
        Some(detail) => format!("✔ {}: {} ({})", name, detail, format_duration(elapsed)),
        None => format!("✔ {} ({})", name, format_duration(elapsed)),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else if secs >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_pick_a_readable_unit() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(754)), "12m34s");
    }

    #[test]
    fn stage_line_carries_detail() {
        assert_eq!(
            stage_line("Open frame source", Some("stub://road (synthetic)"), Duration::from_millis(3)),
            "✔ Open frame source: stub://road (synthetic) (3ms)"
        );
        assert_eq!(stage_line("Load config", None, Duration::ZERO), "✔ Load config (0ms)");
    }
}
