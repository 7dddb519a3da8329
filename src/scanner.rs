use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::probe;

/// Highest TCP port number; sweeps cover `1..=MAX_PORT`.
pub const MAX_PORT: u16 = 65535;

/// Concurrent probe budget for production sweeps. Probes spend their time
/// blocked on network I/O rather than CPU, so this sits far above core
/// count; it trades sweep wall-clock time against simultaneous outbound
/// connection pressure on agent and target.
pub const WORKER_COUNT: usize = 2000;

/// Per-probe connect timeout. Short enough that a full sweep finishes well
/// inside the polling interval even when filtered ports eat the whole
/// timeout: worst case is roughly `PROBE_TIMEOUT * (65535 / WORKER_COUNT)`.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(750);

/// Sweeps a port range against one host using asynchronous TCP connects
/// with a fixed concurrency budget.
///
/// - A `Semaphore` bounds in-flight probes: each port becomes a task that
///   holds a permit for its whole attempt, so at most `concurrency` probes
///   run at once no matter how many ports are queued.
/// - Ports are dispatched in ascending order but complete in arbitrary
///   order; results are re-sorted before returning.
/// - Draining the `JoinSet` is the completion barrier: the result list is
///   final only after every spawned probe has finished, so a sweep neither
///   truncates early nor hangs.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    concurrency: usize,
    timeout: Duration,
    ports: RangeInclusive<u16>,
}

impl ScanEngine {
    /// Engine over the full port space. `concurrency` is clamped to
    /// [1, 5000].
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.clamp(1, 5_000),
            timeout,
            ports: 1..=MAX_PORT,
        }
    }

    /// Restrict the sweep to a sub-range. Production paths always sweep
    /// the full space; this keeps tests small and deterministic.
    pub fn with_port_range(mut self, ports: RangeInclusive<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Probe every port in the configured range exactly once and return
    /// the ascending, duplicate-free list of open ones.
    ///
    /// There is no error path: an unreachable host simply yields an empty
    /// list, indistinguishable from a fully firewalled one.
    pub async fn scan(&self, ip: IpAddr) -> Vec<u16> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for port in self.ports.clone() {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore in scope");
            let timeout = self.timeout;
            set.spawn(async move {
                let _permit = permit; // keep permit until the probe finishes
                probe::probe_port(ip, port, timeout).await.then_some(port)
            });
        }

        let mut open = Vec::new();
        while let Some(res) = set.join_next().await {
            if let Ok(Some(port)) = res {
                open.push(port);
            }
        }

        open.sort_unstable();
        open
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new(WORKER_COUNT, PROBE_TIMEOUT)
    }
}
