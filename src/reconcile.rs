use std::collections::HashSet;

use anyhow::Result;

use crate::store::Store;

/// Merge one scan's observation into the stored port set for a server.
///
/// Reads the existing set, inserts `observed − existing` in a single
/// batch, and returns how many rows went in. An observation that adds
/// nothing is a no-op. Nothing is ever deleted, so after any number of
/// cycles the stored set is the union of every observation so far.
///
/// Any store error aborts the merge and propagates; the caller decides
/// whether the owning scan request is retired or retained.
pub async fn reconcile<S: Store + ?Sized>(
    store: &S,
    server_id: i32,
    observed: &[u16],
) -> Result<usize> {
    let known: HashSet<u16> = store.known_ports(server_id).await?.into_iter().collect();
    let fresh: Vec<u16> = observed
        .iter()
        .copied()
        .filter(|p| !known.contains(p))
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }
    store.insert_ports(server_id, &fresh).await?;
    Ok(fresh.len())
}
