//! Applies a reconcile plan against the media server
//!
//! Ops run strictly in emission order. A failed op is recorded and the batch
//! carries on; earlier successes are never rolled back, the next scheduled
//! run picks up whatever is still out of line.

use tracing::{debug, info, warn};

use super::error::CollectionError;
use super::reconciler::{CollectionId, ReconcileOp};
use crate::services::media_server::{Library, MediaServer};

/// Result of applying one op
#[derive(Debug, Clone, PartialEq)]
pub struct OpOutcome {
    pub op: ReconcileOp,
    pub result: Result<Applied, CollectionError>,
}

impl OpOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// What a successful op did on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(CollectionId),
    Updated,
    Unchanged,
}

/// Apply `ops` to `library` in order, reporting each outcome
pub async fn execute(
    server: &dyn MediaServer,
    library: &Library,
    ops: &[ReconcileOp],
) -> Vec<OpOutcome> {
    let mut outcomes = Vec::with_capacity(ops.len());

    for op in ops {
        let result = apply(server, library, op).await;
        match &result {
            Ok(Applied::Unchanged) => debug!(library = %library.title, op = %op, "No change"),
            Ok(_) => info!(library = %library.title, op = %op, "Applied"),
            Err(e) => warn!(library = %library.title, op = %op, error = %e, "Operation failed"),
        }
        outcomes.push(OpOutcome {
            op: op.clone(),
            result,
        });
    }

    outcomes
}

async fn apply(
    server: &dyn MediaServer,
    library: &Library,
    op: &ReconcileOp,
) -> Result<Applied, CollectionError> {
    match op {
        ReconcileOp::Create { name, items } => server
            .create_collection(library, name, items)
            .await
            .map(Applied::Created)
            .map_err(|e| CollectionError::unavailable(op.to_string(), &e)),
        ReconcileOp::AddItems {
            collection_id,
            items,
            ..
        } => server
            .add_items_to_collection(collection_id, items)
            .await
            .map(|_| Applied::Updated)
            .map_err(|e| CollectionError::unavailable(op.to_string(), &e)),
        ReconcileOp::RemoveItems {
            collection_id,
            items,
            ..
        } => server
            .remove_items_from_collection(collection_id, items)
            .await
            .map(|_| Applied::Updated)
            .map_err(|e| CollectionError::unavailable(op.to_string(), &e)),
        ReconcileOp::NoOp { .. } => Ok(Applied::Unchanged),
    }
}
