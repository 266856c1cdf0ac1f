use crate::core::models::ids::DecoyId;

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// A decoy reached a terminal state. `energy` is absent for failed decoys.
    DecoyFinished {
        decoy: DecoyId,
        energy: Option<f64>,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::GridOriginId;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::TaskIncrement);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let tag = match event {
                Progress::PhaseStart { name } => name.to_string(),
                Progress::DecoyFinished { decoy, .. } => decoy.to_string(),
                _ => "other".to_string(),
            };
            seen.lock().unwrap().push(tag);
        }));

        reporter.report(Progress::PhaseStart { name: "Grid" });
        reporter.report(Progress::DecoyFinished {
            decoy: DecoyId::new(GridOriginId(2), 7),
            energy: Some(-1.0),
        });
        drop(reporter);

        assert_eq!(seen.into_inner().unwrap(), vec!["Grid", "2_7"]);
    }
}
