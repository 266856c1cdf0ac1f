use super::atomic::atomic_write;
use super::error::ReportError;
use crate::core::models::ids::DecoyId;
use crate::core::models::step::{Perturbation, StepRecord};
use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// File locations of everything one decoy writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoyPaths {
    pub run_log: PathBuf,
    pub energy_log: PathBuf,
    pub status: PathBuf,
    pub state: PathBuf,
    pub job_script: PathBuf,
    /// Id of the queue job last submitted for this decoy.
    pub job_id: PathBuf,
    pub job_stdout: PathBuf,
    pub job_stderr: PathBuf,
}

impl DecoyPaths {
    /// Layout: `<root>/origin_<g>/decoy_<d>.<kind>`.
    pub fn new(root: &Path, id: DecoyId) -> Self {
        let dir = Self::origin_dir(root, id);
        let stem = format!("decoy_{}", id.index);
        let file = |ext: &str| dir.join(format!("{}.{}", stem, ext));
        Self {
            run_log: file("run.csv"),
            energy_log: file("energy.csv"),
            status: file("status"),
            state: file("state.toml"),
            job_script: file("sh"),
            job_id: file("job"),
            job_stdout: file("out"),
            job_stderr: file("err"),
        }
    }

    pub fn origin_dir(root: &Path, id: DecoyId) -> PathBuf {
        root.join(format!("origin_{}", id.origin.0))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RunLogRow {
    step: usize,
    translation_x: f64,
    translation_y: f64,
    translation_z: f64,
    rotation_angle: f64,
    rotation_axis_x: f64,
    rotation_axis_y: f64,
    rotation_axis_z: f64,
    filter_passed: bool,
    energy_before: f64,
    energy_after: Option<f64>,
    accepted: bool,
}

impl From<&StepRecord> for RunLogRow {
    fn from(r: &StepRecord) -> Self {
        let t = &r.perturbation.translation;
        let axis = r.perturbation.rotation_axis.as_ref();
        Self {
            step: r.step,
            translation_x: t.x,
            translation_y: t.y,
            translation_z: t.z,
            rotation_angle: r.perturbation.rotation_angle,
            rotation_axis_x: axis.x,
            rotation_axis_y: axis.y,
            rotation_axis_z: axis.z,
            filter_passed: r.filter_passed,
            energy_before: r.energy_before,
            energy_after: r.energy_after,
            accepted: r.accepted,
        }
    }
}

impl From<RunLogRow> for StepRecord {
    fn from(row: RunLogRow) -> Self {
        StepRecord {
            step: row.step,
            perturbation: Perturbation {
                translation: Vector3::new(row.translation_x, row.translation_y, row.translation_z),
                rotation_angle: row.rotation_angle,
                rotation_axis: Unit::new_normalize(Vector3::new(
                    row.rotation_axis_x,
                    row.rotation_axis_y,
                    row.rotation_axis_z,
                )),
            },
            filter_passed: row.filter_passed,
            energy_before: row.energy_before,
            energy_after: row.energy_after,
            accepted: row.accepted,
        }
    }
}

/// Entry of the energy log: one accepted, improving step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyEntry {
    pub step: usize,
    pub energy: f64,
}

fn create_truncated(path: &Path) -> Result<File, ReportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ReportError::io(path, e))
}

/// Append-only CSV record of every executed step.
pub struct RunLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RunLog {
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let file = create_truncated(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: csv::Writer::from_writer(file),
        })
    }

    pub fn append(&mut self, record: &StepRecord) -> Result<(), ReportError> {
        self.writer
            .serialize(RunLogRow::from(record))
            .map_err(|e| ReportError::csv(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| ReportError::io(&self.path, e))
    }

    pub fn read(path: &Path) -> Result<Vec<StepRecord>, ReportError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| ReportError::csv(path, e))?;
        reader
            .deserialize::<RunLogRow>()
            .map(|row| row.map(StepRecord::from).map_err(|e| ReportError::csv(path, e)))
            .collect()
    }
}

/// Append-only CSV ledger of accepted, improving steps.
pub struct EnergyLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl EnergyLog {
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        let file = create_truncated(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: csv::Writer::from_writer(file),
        })
    }

    pub fn append(&mut self, entry: EnergyEntry) -> Result<(), ReportError> {
        self.writer
            .serialize(entry)
            .map_err(|e| ReportError::csv(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| ReportError::io(&self.path, e))
    }

    pub fn read(path: &Path) -> Result<Vec<EnergyEntry>, ReportError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| ReportError::csv(path, e))?;
        reader
            .deserialize::<EnergyEntry>()
            .map(|row| row.map_err(|e| ReportError::csv(path, e)))
            .collect()
    }

    /// Lowest committed energy, or `None` when the file is missing or empty.
    pub fn best(path: &Path) -> Result<Option<EnergyEntry>, ReportError> {
        if !path.exists() {
            return Ok(None);
        }
        let entries = Self::read(path)?;
        Ok(entries.into_iter().min_by(|a, b| {
            a.energy
                .partial_cmp(&b.energy)
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }
}

/// Single-line `"<step>/<max>"` progress marker, fully replaced on every write.
pub struct StatusLine {
    path: PathBuf,
    max_steps: usize,
}

impl StatusLine {
    pub fn new(path: &Path, max_steps: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            max_steps,
        }
    }

    pub fn write(&self, step: usize) -> Result<(), ReportError> {
        let line = format!("{}/{}\n", step.min(self.max_steps), self.max_steps);
        atomic_write(&self.path, line.as_bytes()).map_err(|e| ReportError::io(&self.path, e))
    }

    pub fn read(path: &Path) -> Result<(usize, usize), ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        let line = content.trim();
        let malformed = || ReportError::MalformedStatus {
            path: path.to_path_buf(),
            line: line.to_string(),
        };
        let (current, max) = line.split_once('/').ok_or_else(malformed)?;
        let current = current.trim().parse().map_err(|_| malformed())?;
        let max = max.trim().parse().map_err(|_| malformed())?;
        Ok((current, max))
    }
}

/// The three progress artifacts of one decoy, written by a single owner.
pub struct ReporterSet {
    run_log: RunLog,
    energy_log: EnergyLog,
    status: StatusLine,
}

impl ReporterSet {
    /// Starts a fresh set of reporters, truncating logs left by an earlier attempt.
    pub fn create(paths: &DecoyPaths, max_steps: usize) -> Result<Self, ReportError> {
        let reporters = Self {
            run_log: RunLog::create(&paths.run_log)?,
            energy_log: EnergyLog::create(&paths.energy_log)?,
            status: StatusLine::new(&paths.status, max_steps),
        };
        reporters.status.write(0)?;
        Ok(reporters)
    }

    pub fn record(&mut self, record: &StepRecord) -> Result<(), ReportError> {
        self.run_log.append(record)?;
        if let (true, Some(energy)) = (record.accepted, record.energy_after) {
            self.energy_log.append(EnergyEntry {
                step: record.step,
                energy,
            })?;
        }
        self.status.write(record.step)
    }

    pub fn flush(&mut self) -> Result<(), ReportError> {
        self.run_log
            .writer
            .flush()
            .map_err(|e| ReportError::io(&self.run_log.path, e))?;
        self.energy_log
            .writer
            .flush()
            .map_err(|e| ReportError::io(&self.energy_log.path, e))
    }
}
