//! Process spawning and filesystem seams.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// A spawned process: its output streams and a control handle.
pub struct SpawnedProcess {
    pub stdout: Box<dyn Read + Send>,
    pub stderr: Box<dyn Read + Send>,
    pub control: Box<dyn ProcessControl>,
}

/// Control over a running process.
pub trait ProcessControl: Send {
    /// Exit code if the process has exited. Death by signal is reported as -1.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;

    /// Forcefully terminate the process.
    fn kill(&mut self) -> io::Result<()>;

    /// OS process id, if there is one.
    fn id(&self) -> Option<u32> {
        None
    }
}

/// Launches external programs.
pub trait Executor: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<SpawnedProcess>;
}

/// Filesystem existence checks.
pub trait PathResolver: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Runs programs with `std::process::Command`, stdin closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("Spawning: {:?}", cmd);

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stderr"))?;

        Ok(SpawnedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            control: Box::new(ChildControl(child)),
        })
    }
}

struct ChildControl(Child);

impl ProcessControl for ChildControl {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.0.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.0.kill() {
            // Already reaped
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn id(&self) -> Option<u32> {
        Some(self.0.id())
    }
}

/// Checks paths against the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPathResolver;

impl PathResolver for FsPathResolver {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
