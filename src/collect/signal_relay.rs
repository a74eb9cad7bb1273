use crate::prelude::*;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

use super::SUPERVISOR_TARGET;

enum InterruptSource {
    Os(tokio::signal::unix::Signal),
    Manual(mpsc::UnboundedReceiver<()>),
}

/// Interrupts to relay to a supervised child.
///
/// Passed explicitly to the supervisor instead of being registered globally, so several
/// supervisions in one process never observe each other's interrupts.
pub struct Interrupts {
    source: InterruptSource,
}

/// Sends interrupts to a manual [`Interrupts`].
#[derive(Clone)]
pub struct InterruptHandle(mpsc::UnboundedSender<()>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        // The receiver is gone once the supervision finished, nothing left to interrupt.
        let _ = self.0.send(());
    }
}

impl Interrupts {
    /// Listens for `SIGINT` delivered to this process.
    ///
    /// The listener is armed as soon as this returns: an interrupt received before the
    /// supervisor starts waiting is kept pending and relayed then.
    pub fn from_os() -> Result<Self> {
        let listener =
            signal(SignalKind::interrupt()).context("Failed to listen for interrupt signals")?;
        Ok(Self {
            source: InterruptSource::Os(listener),
        })
    }

    pub fn manual() -> (InterruptHandle, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            InterruptHandle(sender),
            Self {
                source: InterruptSource::Manual(receiver),
            },
        )
    }

    /// The signal forwarded to the child for each interrupt.
    pub fn signal(&self) -> Signal {
        Signal::SIGINT
    }

    /// Waits for the next interrupt. Returns `None` once no more interrupts can arrive.
    pub async fn recv(&mut self) -> Option<()> {
        match &mut self.source {
            InterruptSource::Os(listener) => listener.recv().await,
            InterruptSource::Manual(receiver) => receiver.recv().await,
        }
    }
}

/// Forwards at most one interrupt to a live child.
pub struct SignalRelay {
    pid: Pid,
    relayed: Option<Signal>,
}

impl SignalRelay {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Pid::from_raw(pid as i32),
            relayed: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.relayed.is_none()
    }

    /// The signal that was forwarded, if any.
    pub fn relayed(&self) -> Option<Signal> {
        self.relayed
    }

    /// Forwards `signal` to the child. Must only be called while the child has not been reaped.
    pub fn relay(&mut self, signal: Signal) -> Result<()> {
        if !self.is_armed() {
            return Ok(());
        }

        debug!(target: SUPERVISOR_TARGET, "Relaying {signal} to process {}", self.pid);
        kill(self.pid, signal)
            .with_context(|| format!("Failed to relay {signal} to process {}", self.pid))?;
        self.relayed = Some(signal);
        Ok(())
    }
}
