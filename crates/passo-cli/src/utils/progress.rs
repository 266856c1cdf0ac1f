use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use passo::engine::progress::{Progress, ProgressCallback};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const TICK: Duration = Duration::from_millis(100);

/// Running counts of terminal decoys shown next to the bar.
#[derive(Debug, Default)]
struct Tally {
    finished: usize,
    failed: usize,
    best: Option<f64>,
}

impl Tally {
    fn record(&mut self, energy: Option<f64>) {
        let Some(energy) = energy else {
            self.failed += 1;
            return;
        };
        self.finished += 1;
        self.best = Some(self.best.map_or(energy, |b| b.min(energy)));
    }

    fn summary(&self) -> String {
        let mut line = format!("{} ok, {} failed", self.finished, self.failed);
        if let Some(best) = self.best {
            let _ = write!(line, ", best {:.2}", best);
        }
        line
    }
}

struct BarState {
    bar: ProgressBar,
    tally: Tally,
}

impl BarState {
    fn apply(&mut self, event: Progress) {
        let bar = &self.bar;
        match event {
            Progress::PhaseStart { name } => {
                bar.reset();
                bar.set_length(0);
                bar.set_style(spinner_style());
                bar.set_message(name);
                bar.enable_steady_tick(TICK);
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                bar.finish_with_message("✓ Done");
            }
            Progress::TaskStart { total_steps } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_style(decoy_style());
                bar.set_length(total_steps);
                self.tally = Tally::default();
            }
            Progress::TaskIncrement => bar.inc(1),
            Progress::TaskFinish => {
                if let Some(len) = bar.length() {
                    bar.set_position(len);
                }
                bar.finish();
            }
            Progress::DecoyFinished { energy, .. } => {
                self.tally.record(energy);
                bar.set_message(self.tally.summary());
            }
            Progress::Message(text) if bar.is_finished() => bar.set_message(text),
            Progress::Message(text) => bar.println(format!("  {}", text)),
        }
    }
}

/// Drives a single stderr progress bar from engine progress events.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        bar.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(BarState {
                bar,
                tally: Tally::default(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = Arc::clone(&self.display);
        Box::new(move |event| match display.lock() {
            Ok(mut state) => state.apply(event),
            Err(_) => warn!("Progress display lock poisoned; dropping event."),
        })
    }

    #[cfg(test)]
    fn bar(&self) -> ProgressBar {
        self.display.lock().unwrap().bar.clone()
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn decoy_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:36.cyan/blue} {pos}/{len} decoys ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.0}s left", state.eta().as_secs_f64());
        })
        .progress_chars("=> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use passo::core::models::ids::{DecoyId, GridOriginId};

    fn finished(callback: &ProgressCallback<'static>, index: usize, energy: Option<f64>) {
        callback(Progress::DecoyFinished {
            decoy: DecoyId::new(GridOriginId(1), index),
            energy,
        });
    }

    #[test]
    fn tally_keeps_the_lowest_energy() {
        let mut tally = Tally::default();
        assert_eq!(tally.summary(), "0 ok, 0 failed");

        tally.record(Some(-3.0));
        tally.record(None);
        tally.record(Some(-7.25));
        tally.record(Some(-5.0));

        assert_eq!(tally.summary(), "3 ok, 1 failed, best -7.25");
    }

    #[test]
    fn decoy_task_tracks_position_and_tally() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Running decoys" });
        assert_eq!(handler.bar().message(), "Running decoys");

        callback(Progress::TaskStart { total_steps: 6 });
        callback(Progress::TaskIncrement);
        finished(&callback, 0, Some(-10.0));
        callback(Progress::TaskIncrement);
        finished(&callback, 1, None);

        let bar = handler.bar();
        assert_eq!(bar.length(), Some(6));
        assert_eq!(bar.position(), 2);
        assert_eq!(bar.message(), "1 ok, 1 failed, best -10.00");

        callback(Progress::TaskFinish);
        let bar = handler.bar();
        assert!(bar.is_finished());
        assert_eq!(bar.position(), 6);
    }

    #[test]
    fn a_new_task_resets_the_tally() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::TaskStart { total_steps: 2 });
        finished(&callback, 0, Some(-1.0));
        callback(Progress::TaskStart { total_steps: 2 });
        finished(&callback, 1, None);

        assert_eq!(handler.bar().message(), "0 ok, 1 failed");
    }

    #[test]
    fn events_from_worker_threads_reach_the_bar() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();
        callback(Progress::TaskStart { total_steps: 8 });

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let callback = &callback;
                scope.spawn(move || {
                    callback(Progress::TaskIncrement);
                    callback(Progress::TaskIncrement);
                });
            }
        });

        assert_eq!(handler.bar().position(), 8);
        callback(Progress::PhaseFinish);
        assert_eq!(handler.bar().message(), "✓ Done");
    }
}
