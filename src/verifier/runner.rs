//! Simulation launcher.
//!
//! Runs the simulation executable for one answer test in its own working
//! directory and blocks (asynchronously) until it exits or its wall-clock
//! budget runs out.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::models::{
    AnswerTestSpec, ConfigError, HarnessError, Result, SimulationConfig, is_plain_name,
};

/// Launches simulations for answer tests.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    launcher: Option<PathBuf>,
    launcher_args: Vec<String>,
    executable: PathBuf,
    input_dir: PathBuf,
    work_root: PathBuf,
    show_progress: bool,
}

impl SimulationRunner {
    pub fn new(executable: impl Into<PathBuf>, input_dir: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            launcher: None,
            launcher_args: Vec::new(),
            executable: executable.into(),
            input_dir: input_dir.into(),
            work_root: work_root.into(),
            show_progress: false,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            launcher: config.launcher_path(),
            launcher_args: config.launcher_args.clone(),
            ..Self::new(
                config.executable_path(),
                config.input_dir_path(),
                config.work_dir_path(),
            )
        }
    }

    /// Use a parallel launcher (e.g. charmrun) in front of the executable.
    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.launcher = Some(launcher.into());
        self.launcher_args = args;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Working directory for a test.
    pub fn work_dir(&self, test: &AnswerTestSpec) -> PathBuf {
        self.work_root.join(&test.name)
    }

    /// Program and arguments for a test.
    pub fn command_line(&self, test: &AnswerTestSpec) -> (PathBuf, Vec<String>) {
        let parameter_file = absolute(&self.input_dir.join(&test.parameter_file));
        let executable = absolute(&self.executable);

        match &self.launcher {
            Some(launcher) => {
                let mut args = vec![format!("+p{}", test.ncpus)];
                args.extend(self.launcher_args.iter().cloned());
                args.push(executable.display().to_string());
                args.push(parameter_file.display().to_string());
                (absolute(launcher), args)
            }
            None => (executable, vec![parameter_file.display().to_string()]),
        }
    }

    /// Run the simulation for `test`, replacing any previous working directory.
    /// Returns the directory the simulation wrote its output into.
    pub async fn run(&self, test: &AnswerTestSpec) -> Result<PathBuf> {
        if !is_plain_name(&test.name) {
            return Err(ConfigError::Invalid(format!(
                "answer test name '{}' cannot be used as a work dir",
                test.name
            ))
            .into());
        }
        let work_dir = self.work_dir(test);
        if work_dir.exists() {
            fs::remove_dir_all(&work_dir)
                .map_err(|e| HarnessError::io("clearing simulation work dir", e))?;
        }
        fs::create_dir_all(&work_dir)
            .map_err(|e| HarnessError::io("creating simulation work dir", e))?;

        let stdout = File::create(work_dir.join(format!("{}.out", test.name)))
            .map_err(|e| HarnessError::io("creating simulation stdout log", e))?;
        let stderr = File::create(work_dir.join(format!("{}.err", test.name)))
            .map_err(|e| HarnessError::io("creating simulation stderr log", e))?;

        let (program, args) = self.command_line(test);
        debug!(test = %test.name, program = %program.display(), ?args, "Launching simulation");

        let mut child = Command::new(&program)
            .args(&args)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarnessError::io(format!("spawning {}", program.display()), e))?;

        let spinner = self.spinner(test);
        let start = Instant::now();
        let limit = test.max_runtime();

        let waited = tokio::time::timeout(limit, child.wait()).await;
        spinner.finish_and_clear();

        let status = match waited {
            Ok(status) => status.map_err(|e| HarnessError::io("waiting for simulation", e))?,
            Err(_) => {
                warn!(test = %test.name, ?limit, "Simulation timed out, killing it");
                if let Err(e) = child.kill().await {
                    warn!(test = %test.name, error = %e, "Failed to kill simulation");
                }
                return Err(HarnessError::Timeout {
                    test: test.name.clone(),
                    limit,
                });
            }
        };

        if !status.success() {
            return Err(HarnessError::SimulationFailed {
                test: test.name.clone(),
                status: status.to_string(),
            });
        }

        info!(
            test = %test.name,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Simulation finished"
        );
        Ok(work_dir)
    }

    fn spinner(&self, test: &AnswerTestSpec) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("running {} on {} cpus", test.name, test.ncpus));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

/// Resolve relative paths against the current directory so they survive
/// the change of working directory. Bare names are left for `PATH` lookup.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() || path.components().count() == 1 {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
