use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::types::Server;

/// Connection pool cap. Keeps store pressure low; the serialized pipeline
/// never needs more than a couple of connections at once.
pub const DB_MAX_CONNS: u32 = 5;

/// Postgres caps bind parameters per statement at 65535; two binds per
/// port row means a full-range insert must be chunked.
const INSERT_CHUNK: usize = 5_000;

/// Persistence seam for the agent. The pipeline and reconciler only talk
/// to this trait, so tests can swap in an in-memory implementation.
///
/// Schema ownership (tables, migrations) lives with the web side of the
/// deployment; the agent reads `Server` and `Scan`, inserts into `Port`,
/// and deletes retired `Scan` rows. Nothing here ever removes a port.
#[async_trait]
pub trait Store: Send + Sync {
    /// Server ids with a queued scan request, in query order.
    async fn pending_scans(&self) -> Result<Vec<i32>>;

    /// Look up a server row; `None` when the request points at a server
    /// that no longer exists.
    async fn server_by_id(&self, id: i32) -> Result<Option<Server>>;

    /// Previously recorded open ports for a server.
    async fn known_ports(&self, server_id: i32) -> Result<Vec<u16>>;

    /// Batch-insert newly observed ports. All-or-nothing: on error no row
    /// of the batch is persisted.
    async fn insert_ports(&self, server_id: i32, ports: &[u16]) -> Result<()>;

    /// Retire the scan request for a server.
    async fn delete_scan(&self, server_id: i32) -> Result<()>;
}

/// `Store` backed by a Postgres pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with the fixed pool cap. Failure here is the one fatal
    /// startup path of the agent.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DB_MAX_CONNS)
            .connect(url)
            .await
            .context("failed to connect to database")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn pending_scans(&self) -> Result<Vec<i32>> {
        sqlx::query_scalar::<_, i32>(r#"SELECT "serverId" FROM "Scan""#)
            .fetch_all(&self.pool)
            .await
            .context("failed to list pending scan requests")
    }

    async fn server_by_id(&self, id: i32) -> Result<Option<Server>> {
        sqlx::query_as::<_, Server>(r#"SELECT id, ip FROM "Server" WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to fetch server {id}"))
    }

    async fn known_ports(&self, server_id: i32) -> Result<Vec<u16>> {
        let rows = sqlx::query_scalar::<_, i32>(
            r#"SELECT port FROM "Port" WHERE "serverId" = $1"#,
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to fetch known ports for server {server_id}"))?;
        Ok(rows
            .into_iter()
            .filter_map(|p| u16::try_from(p).ok())
            .collect())
    }

    async fn insert_ports(&self, server_id: i32, ports: &[u16]) -> Result<()> {
        if ports.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin port insert transaction")?;
        for chunk in ports.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(r#"INSERT INTO "Port" ("serverId", port) "#);
            builder.push_values(chunk, |mut row, port| {
                row.push_bind(server_id).push_bind(i32::from(*port));
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to insert ports for server {server_id}"))?;
        }
        tx.commit()
            .await
            .context("failed to commit port insert transaction")
    }

    async fn delete_scan(&self, server_id: i32) -> Result<()> {
        sqlx::query(r#"DELETE FROM "Scan" WHERE "serverId" = $1"#)
            .bind(server_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to retire scan request for server {server_id}"))?;
        Ok(())
    }
}
