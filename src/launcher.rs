//! Dev launcher: runs the backend and the frontend dev server side by side.
//!
//! DESIGN
//! ======
//! Commands are described as plain [`ProcessPlan`] values so the per-OS
//! program selection can be tested without spawning anything. `run_dev`
//! keeps both children alive until Ctrl-C or until either exits, then stops
//! the other.

#[cfg(test)]
#[path = "launcher_test.rs"]
mod launcher_test;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::LauncherConfig;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("{name} directory not found: {}", dir.display())]
    MissingDir { name: &'static str, dir: PathBuf },
    #[error("failed to start {name} (`{program}`): {source}")]
    Spawn {
        name: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting on {name}: {source}")]
    Wait {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} exited with {status}")]
    Exited { name: &'static str, status: ExitStatus },
    #[error("failed to listen for Ctrl-C: {0}")]
    Signal(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Unix,
}

impl HostOs {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    fn python(self) -> &'static str {
        match self {
            Self::Windows => "python",
            Self::Unix => "python3",
        }
    }

    fn npm(self) -> &'static str {
        match self {
            Self::Windows => "npm.cmd",
            Self::Unix => "npm",
        }
    }
}

/// A child process to run: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPlan {
    pub name: &'static str,
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
}

impl ProcessPlan {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.dir).kill_on_drop(true);
        cmd
    }

    fn spawn(&self) -> Result<Child, LaunchError> {
        ensure_dir(self.name, &self.dir)?;
        info!(name = self.name, program = %self.program, dir = %self.dir.display(), "starting");
        self.command().spawn().map_err(|source| LaunchError::Spawn {
            name: self.name,
            program: self.program.clone(),
            source,
        })
    }
}

// =============================================================================
// PLANS
// =============================================================================

#[must_use]
pub fn backend_plan(config: &LauncherConfig, os: HostOs) -> ProcessPlan {
    ProcessPlan {
        name: "backend",
        program: os.python().to_owned(),
        args: vec![
            "-m".to_owned(),
            "uvicorn".to_owned(),
            "main:app".to_owned(),
            "--host".to_owned(),
            "0.0.0.0".to_owned(),
            "--port".to_owned(),
            config.backend_port.to_string(),
            "--reload".to_owned(),
        ],
        dir: config.backend_dir.clone(),
    }
}

#[must_use]
pub fn frontend_plan(config: &LauncherConfig, os: HostOs) -> ProcessPlan {
    ProcessPlan {
        name: "frontend",
        program: os.npm().to_owned(),
        args: vec![
            "run".to_owned(),
            "dev".to_owned(),
            "--".to_owned(),
            "--port".to_owned(),
            config.frontend_port.to_string(),
        ],
        dir: config.frontend_dir.clone(),
    }
}

#[must_use]
pub fn build_plan(config: &LauncherConfig, os: HostOs) -> ProcessPlan {
    ProcessPlan {
        name: "frontend build",
        program: os.npm().to_owned(),
        args: vec!["run".to_owned(), "build".to_owned()],
        dir: config.frontend_dir.clone(),
    }
}

/// Status lines printed once both processes are up.
#[must_use]
pub fn status_banner(config: &LauncherConfig) -> String {
    format!(
        "Litflix is starting\n  backend:  {} (API docs at {}/docs)\n  frontend: {}\nPress Ctrl-C to stop both.",
        config.backend_url(),
        config.backend_url(),
        config.frontend_url(),
    )
}

fn ensure_dir(name: &'static str, dir: &Path) -> Result<(), LaunchError> {
    if dir.is_dir() { Ok(()) } else { Err(LaunchError::MissingDir { name, dir: dir.to_path_buf() }) }
}

// =============================================================================
// RUNNERS
// =============================================================================

/// Start backend and frontend, print status and wait.
///
/// # Errors
///
/// Returns an error if either process fails to start, or if one of them exits
/// with a failure status before Ctrl-C.
pub async fn run_dev(config: &LauncherConfig) -> Result<(), LaunchError> {
    let os = HostOs::current();
    let backend = backend_plan(config, os);
    let frontend = frontend_plan(config, os);

    let mut backend_child = backend.spawn()?;
    let mut frontend_child = match frontend.spawn() {
        Ok(child) => child,
        Err(e) => {
            stop(backend.name, &mut backend_child).await;
            return Err(e);
        }
    };

    println!("{}", status_banner(config));

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(LaunchError::Signal)?;
            info!("Ctrl-C received; stopping");
            Ok(())
        }
        status = backend_child.wait() => exited(backend.name, status),
        status = frontend_child.wait() => exited(frontend.name, status),
    };

    stop(backend.name, &mut backend_child).await;
    stop(frontend.name, &mut frontend_child).await;
    println!("Litflix stopped");
    outcome
}

/// Run the frontend production build.
///
/// # Errors
///
/// Returns an error if the build cannot start or exits unsuccessfully.
pub async fn run_build(config: &LauncherConfig) -> Result<(), LaunchError> {
    let plan = build_plan(config, HostOs::current());
    let mut child = plan.spawn()?;
    let status = child.wait().await.map_err(|source| LaunchError::Wait { name: plan.name, source })?;
    if !status.success() {
        return Err(LaunchError::Exited { name: plan.name, status });
    }
    println!("Frontend build finished");
    Ok(())
}

fn exited(name: &'static str, status: std::io::Result<ExitStatus>) -> Result<(), LaunchError> {
    let status = status.map_err(|source| LaunchError::Wait { name, source })?;
    warn!(name, %status, "process exited");
    if status.success() { Ok(()) } else { Err(LaunchError::Exited { name, status }) }
}

async fn stop(name: &'static str, child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(name, error = %e, "failed to stop process");
    } else {
        info!(name, "stopped");
    }
}
