use serde::Serialize;

/// A monitored server row. Owned by the web side of the deployment;
/// the agent only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Server {
    pub id: i32,
    pub ip: String,
}

/// Output of one standalone scan invocation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub target: String,
    pub open_ports: Vec<u16>,
    pub duration_ms: u64,
}
