//! Bounded observation of long-running remote operations.
//!
//! The poller repeatedly probes a status string and interprets it against a
//! fixed table of terminal states. It never raises: every way observation can
//! end maps to an [`OperationStatus`].

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default delay between two probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound on the whole observation.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Stack statuses that end an operation successfully.
const STACK_SUCCESS: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE", "IMPORT_COMPLETE"];

/// Stack statuses that end an operation unsuccessfully.
const STACK_FAILURE: &[&str] = &[
    "CREATE_FAILED",
    "ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
    "DELETE_COMPLETE",
    "DELETE_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
    "UPDATE_ROLLBACK_FAILED",
    "UPDATE_FAILED",
    "IMPORT_ROLLBACK_COMPLETE",
    "IMPORT_ROLLBACK_FAILED",
];

/// Terminal states of stack operations.
pub const STACK_TERMINAL_STATES: TerminalStates = TerminalStates {
    success: STACK_SUCCESS,
    failure: STACK_FAILURE,
};

/// Reads the current status of a remote operation.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Returns the current status string, or `None` if nothing is known yet.
    async fn probe(&self, handle: &str) -> Result<Option<String>>;
}

/// Table of status strings that end an operation.
///
/// Any status not listed is treated as still in progress.
#[derive(Debug, Clone, Copy)]
pub struct TerminalStates {
    /// Statuses meaning success.
    pub success: &'static [&'static str],
    /// Statuses meaning failure.
    pub failure: &'static [&'static str],
}

impl TerminalStates {
    /// Returns true if the status ends the operation successfully.
    #[must_use]
    pub fn is_success(&self, status: &str) -> bool {
        self.success.contains(&status)
    }

    /// Returns true if the status ends the operation unsuccessfully.
    #[must_use]
    pub fn is_failure(&self, status: &str) -> bool {
        self.failure.contains(&status)
    }
}

/// How observation of an operation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationStatus {
    /// A success status was observed.
    Succeeded {
        /// The observed status.
        status: String,
    },
    /// A failure status was observed.
    Failed {
        /// The observed status.
        status: String,
    },
    /// The bound elapsed first; the operation may still be running remotely.
    TimedOut {
        /// Last status seen before giving up.
        last_seen: Option<String>,
    },
    /// Observation was cancelled by the caller; the operation continues remotely.
    Detached {
        /// Last status seen before detaching.
        last_seen: Option<String>,
    },
}

impl OperationStatus {
    /// Returns true only for an observed success status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Returns true if the final remote state is unknown.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Detached { .. })
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { status } | Self::Failed { status } => write!(f, "{status}"),
            Self::TimedOut { last_seen } => write!(
                f,
                "timed out waiting (last status {}), still in progress remotely",
                last_seen.as_deref().unwrap_or("unknown")
            ),
            Self::Detached { last_seen } => write!(
                f,
                "detached (last status {}), still in progress remotely",
                last_seen.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

/// Interval and bound of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between probes.
    pub interval: Duration,
    /// Bound on the whole observation.
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Polls a status until it is terminal, the bound elapses or observation is cancelled.
#[derive(Debug, Clone, Default)]
pub struct StatusPoller {
    settings: PollSettings,
    cancel: CancellationToken,
}

impl StatusPoller {
    /// Creates a poller.
    #[must_use]
    pub const fn new(settings: PollSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }

    /// Observes an operation until it ends.
    ///
    /// The first probe is immediate. Probe errors are logged and observation
    /// continues; the timeout bounds how long that can go on.
    pub async fn await_completion(
        &self,
        probe: &dyn StatusProbe,
        handle: &str,
        states: &TerminalStates,
    ) -> OperationStatus {
        let deadline = Instant::now() + self.settings.timeout;
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen: Option<String> = None;

        info!("Waiting for {handle} to reach a terminal state");

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Self::detached(handle, last_seen),
                () = sleep_until(deadline) => return self.timed_out(handle, last_seen),
                _ = ticker.tick() => {}
            }

            let probed = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Self::detached(handle, last_seen),
                () = sleep_until(deadline) => return self.timed_out(handle, last_seen),
                probed = probe.probe(handle) => probed,
            };

            match probed {
                Ok(Some(status)) if states.is_success(&status) => {
                    info!("{handle} reached {status}");
                    return OperationStatus::Succeeded { status };
                }
                Ok(Some(status)) if states.is_failure(&status) => {
                    warn!("{handle} reached {status}");
                    return OperationStatus::Failed { status };
                }
                Ok(Some(status)) => {
                    debug!("{handle} is {status}");
                    last_seen = Some(status);
                }
                Ok(None) => debug!("No status for {handle} yet"),
                Err(e) => warn!("Status probe for {handle} failed: {e}"),
            }
        }
    }

    fn detached(handle: &str, last_seen: Option<String>) -> OperationStatus {
        warn!("Stopped observing {handle}; the operation continues remotely");
        OperationStatus::Detached { last_seen }
    }

    fn timed_out(&self, handle: &str, last_seen: Option<String>) -> OperationStatus {
        warn!(
            "Gave up on {handle} after {:?}; it may still be in progress",
            self.settings.timeout
        );
        OperationStatus::TimedOut { last_seen }
    }
}

/// Detaches observation on the first interrupt.
///
/// Returns true once a second interrupt arrives, so the caller can exit.
/// Returns false if interrupts cannot be received.
pub async fn detach_on_interrupt<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        warn!("Cannot listen for interrupts: {e}");
        return false;
    }
    warn!("Interrupted, detaching from the running stack operation (interrupt again to exit)");
    cancel.cancel();

    interrupt().await.is_ok()
}
