use super::atomic::atomic_write;
use super::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Resource request written into every batch script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchSettings {
    pub partition: String,
    pub memory: String,
    pub time_limit: String,
    pub requeue: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            partition: "main".to_string(),
            memory: "4GB".to_string(),
            time_limit: "72:00:00".to_string(),
            requeue: true,
        }
    }
}

/// A self-contained description of one queued decoy job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription {
    pub name: String,
    pub script_path: PathBuf,
    pub script: String,
}

impl JobDescription {
    pub fn new(
        name: impl Into<String>,
        script_path: PathBuf,
        command: &[String],
        settings: &BatchSettings,
        stdout: &Path,
        stderr: &Path,
    ) -> Self {
        let name = name.into();
        let script = render_batch_script(&name, command, settings, stdout, stderr);
        Self {
            name,
            script_path,
            script,
        }
    }

    /// Writes the script next to the decoy's other files.
    pub fn materialize(&self) -> Result<(), ReportError> {
        atomic_write(&self.script_path, self.script.as_bytes())
            .map_err(|e| ReportError::io(&self.script_path, e))
    }
}

pub fn render_batch_script(
    name: &str,
    command: &[String],
    settings: &BatchSettings,
    stdout: &Path,
    stderr: &Path,
) -> String {
    let mut s = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(s, "#!/bin/bash");
    let _ = writeln!(s, "#SBATCH --partition={}", settings.partition);
    let _ = writeln!(s, "#SBATCH --ntasks=1");
    let _ = writeln!(s, "#SBATCH --cpus-per-task=1");
    let _ = writeln!(s, "#SBATCH --mem={}", settings.memory);
    let _ = writeln!(s, "#SBATCH --time={}", settings.time_limit);
    if settings.requeue {
        let _ = writeln!(s, "#SBATCH --requeue");
    }
    let _ = writeln!(s, "#SBATCH --job-name={}", name);
    let _ = writeln!(s, "#SBATCH --output={}", directive_path(stdout));
    let _ = writeln!(s, "#SBATCH --error={}", directive_path(stderr));
    let _ = writeln!(s);
    let quoted: Vec<String> = command.iter().map(|arg| shell_quote(arg)).collect();
    let _ = writeln!(s, "{}", quoted.join(" "));
    s
}

/// sbatch splits `#SBATCH` lines on whitespace outside double quotes.
fn directive_path(path: &Path) -> String {
    let text = path.display().to_string();
    if text.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
