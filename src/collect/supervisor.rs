use crate::error::DoctorError;
use crate::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::{Child, Command};

use super::SUPERVISOR_TARGET;
use super::env::{EnvOverlay, merge_env};
use super::exit_status::{TerminationOutcome, classify_status};
use super::signal_relay::{Interrupts, SignalRelay};

/// A running instrumented child. Dropped once it has been reaped.
pub struct SupervisedProcess {
    pub pid: u32,
    pub argv: Vec<String>,
    child: Child,
}

/// Only the overlaid variables are computed, the rest of the environment is inherited as is.
fn overlaid_env(overlays: &[EnvOverlay]) -> BTreeMap<String, String> {
    let inherited = overlays
        .iter()
        .filter_map(|overlay| {
            std::env::var(&overlay.var)
                .ok()
                .map(|value| (overlay.var.clone(), value))
        })
        .collect::<Vec<_>>();
    merge_env(inherited, overlays)
}

impl SupervisedProcess {
    /// Spawns `argv` with the overlaid environment and the caller's stdio.
    pub fn spawn(
        argv: &[String],
        overlays: &[EnvOverlay],
        working_directory: Option<&Path>,
    ) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DoctorError::InvalidArgument("the command to run is empty".into()))?;

        let env = overlaid_env(overlays);
        let mut cmd = Command::new(program);
        cmd.args(args).envs(&env);
        if let Some(cwd) = working_directory {
            cmd.current_dir(cwd);
        }
        debug!(target: SUPERVISOR_TARGET, "cmd: {cmd:?}");
        debug!(target: SUPERVISOR_TARGET, "env overlay: {env:?}");

        let child = cmd.spawn().map_err(|source| DoctorError::ProcessSpawnFailure {
            command: shell_words::join(argv),
            source,
        })?;
        let pid = child
            .id()
            .context("The spawned process has no pid")?;
        debug!(target: SUPERVISOR_TARGET, "Spawned process {pid}");

        Ok(Self {
            pid,
            argv: argv.to_vec(),
            child,
        })
    }

    /// Waits for the child to exit while relaying interrupts to it, then classifies the exit.
    ///
    /// The relay disarms after its first forward and stops with the wait loop, so no signal
    /// can reach a reaped (and possibly reused) pid.
    pub async fn wait(mut self, interrupts: &mut Interrupts) -> Result<TerminationOutcome> {
        let mut relay = SignalRelay::new(self.pid);
        let relayed_signal = interrupts.signal();

        let status = loop {
            tokio::select! {
                status = self.child.wait() => {
                    break status.context("Failed to wait for the supervised process")?;
                }
                Some(()) = interrupts.recv(), if relay.is_armed() => {
                    relay.relay(relayed_signal)?;
                }
            }
        };

        let outcome = classify_status(status, relay.relayed());
        debug!(target: SUPERVISOR_TARGET, "Process {} exited: {status:?}, {outcome:?}", self.pid);
        Ok(outcome)
    }
}
