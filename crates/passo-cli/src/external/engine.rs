use nalgebra::UnitQuaternion;
use passo::core::models::pose::{Pose, StructureHandle};
use passo::engine::collaborators::{DesignEngine, DesignEngineError, DesignOutcome, DesignRequest};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace};

/// What the engine prints on stdout after a `score` or `design` call.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
struct EngineReport {
    total_energy: f64,
    structure: Option<String>,
}

fn parse_report(stdout: &str) -> Result<EngineReport, DesignEngineError> {
    let report: EngineReport =
        toml::from_str(stdout).map_err(|e| DesignEngineError::MalformedOutput(e.to_string()))?;
    if !report.total_energy.is_finite() {
        return Err(DesignEngineError::MalformedOutput(format!(
            "non-finite total energy {}",
            report.total_energy
        )));
    }
    Ok(report)
}

fn pose_args(pose: &Pose) -> Vec<String> {
    let c = pose.centroid;
    let q = UnitQuaternion::from_rotation_matrix(&pose.orientation);
    vec![
        "--structure".to_string(),
        pose.structure.to_string(),
        "--centroid".to_string(),
        format!("{},{},{}", c.x, c.y, c.z),
        "--rotation".to_string(),
        format!("{},{},{},{}", q.w, q.i, q.j, q.k),
    ]
}

/// Runs the structural-simulation engine as an external program.
///
/// Each call is `<program> [args..] score|design --structure S --centroid x,y,z
/// --rotation w,i,j,k ...`. The program answers with a small TOML document on stdout
/// carrying `total-energy` and, for design calls, the `structure` it wrote.
#[derive(Debug, Clone)]
pub struct ProcessDesignEngine {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl ProcessDesignEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, work_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            work_dir,
        }
    }

    fn invoke(&self, extra: Vec<String>) -> Result<EngineReport, DesignEngineError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(&extra);
        trace!(program = %self.program, args = ?extra, "Invoking design engine.");

        let output = command
            .output()
            .map_err(|source| DesignEngineError::Invocation {
                command: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DesignEngineError::Simulation(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

impl DesignEngine for ProcessDesignEngine {
    fn score(&self, pose: &Pose) -> Result<f64, DesignEngineError> {
        let mut extra = vec!["score".to_string()];
        extra.extend(pose_args(pose));
        Ok(self.invoke(extra)?.total_energy)
    }

    fn design(&self, request: &DesignRequest<'_>) -> Result<DesignOutcome, DesignEngineError> {
        let mut extra = vec!["design".to_string()];
        extra.extend(pose_args(request.pose));
        extra.extend([
            "--chain".to_string(),
            request.target_chain.to_string(),
            "--cutoff".to_string(),
            request.cutoff.to_string(),
            "--cycles".to_string(),
            request.cycles.to_string(),
            "--label".to_string(),
            request.label.clone(),
            "--out-dir".to_string(),
            self.work_dir.display().to_string(),
        ]);

        let report = self.invoke(extra)?;
        let structure = report.structure.ok_or_else(|| {
            DesignEngineError::MalformedOutput("design output lacks 'structure'".to_string())
        })?;
        debug!(label = %request.label, energy = report.total_energy, "Design cycle finished.");

        Ok(DesignOutcome {
            structure: StructureHandle::new(structure),
            total_energy: report.total_energy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Rotation3, Vector3};

    #[test]
    fn report_is_parsed_from_toml() {
        let report = parse_report("total-energy = -812.5\nstructure = \"out/0_0_step1.pdb\"\n")
            .unwrap();
        assert_eq!(report.total_energy, -812.5);
        assert_eq!(report.structure.as_deref(), Some("out/0_0_step1.pdb"));
    }

    #[test]
    fn missing_energy_is_malformed() {
        assert!(matches!(
            parse_report("structure = \"x.pdb\"\n"),
            Err(DesignEngineError::MalformedOutput(_))
        ));
    }

    #[test]
    fn non_finite_energy_is_malformed() {
        assert!(matches!(
            parse_report("total-energy = nan\n"),
            Err(DesignEngineError::MalformedOutput(_))
        ));
    }

    #[test]
    fn pose_arguments_encode_centroid_and_rotation() {
        let mut pose = Pose::new(Point3::new(15.0, 0.5, -1.0), StructureHandle::new("in.pdb"));
        pose.orientation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI);

        let args = pose_args(&pose);

        assert_eq!(args[1], "in.pdb");
        assert_eq!(args[3], "15,0.5,-1");
        let q: Vec<f64> = args[5].split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(q.len(), 4);
        assert!(q[0].abs() < 1e-9);
        assert!((q[3].abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_program_is_an_invocation_error() {
        let engine = ProcessDesignEngine::new(
            "passo-no-such-engine-binary",
            vec![],
            PathBuf::from("."),
        );
        let pose = Pose::new(Point3::origin(), StructureHandle::new("in.pdb"));
        assert!(matches!(
            engine.score(&pose),
            Err(DesignEngineError::Invocation { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn design_runs_the_engine_program() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nif [ \"$1\" = design ]; then\n  echo 'total-energy = -20.0'\n  echo \"structure = \\\"designed.pdb\\\"\"\nelse\n  echo 'total-energy = -10.0'\nfi\n",
        )
        .unwrap();
        let engine = ProcessDesignEngine::new(
            "sh",
            vec![script.display().to_string()],
            dir.path().to_path_buf(),
        );
        let pose = Pose::new(Point3::origin(), StructureHandle::new("in.pdb"));

        assert_eq!(engine.score(&pose).unwrap(), -10.0);
        let outcome = engine
            .design(&DesignRequest {
                pose: &pose,
                target_chain: 'C',
                cutoff: 9.0,
                cycles: 4,
                label: "0_0_step1".to_string(),
            })
            .unwrap();
        assert_eq!(outcome.total_energy, -20.0);
        assert_eq!(outcome.structure, StructureHandle::new("designed.pdb"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_a_simulation_error() {
        let engine = ProcessDesignEngine::new(
            "sh",
            vec!["-c".to_string(), "echo diverged >&2; exit 3".to_string()],
            PathBuf::from("."),
        );
        let pose = Pose::new(Point3::origin(), StructureHandle::new("in.pdb"));
        match engine.score(&pose) {
            Err(DesignEngineError::Simulation(msg)) => assert!(msg.contains("diverged")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
