// Sync service - the two operations exposed to the surrounding service:
// run_sync (fetch, reconcile, persist) and list_entities (read-back).

use crate::db;
use crate::gateway::SourceGateway;
use crate::models::{ReconciledEntity, SyncOutcome};
use crate::reconciler::reconcile;
use crate::validator::Validator;
use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

pub struct SyncService<G: SourceGateway> {
    gateway: G,
    validator: Validator,
}

impl<G: SourceGateway> SyncService<G> {
    pub fn new(gateway: G) -> Self {
        SyncService {
            gateway,
            validator: Validator::new(),
        }
    }

    pub fn with_validator(gateway: G, validator: Validator) -> Self {
        SyncService { gateway, validator }
    }

    /// Run one full sync cycle: fetch both source collections concurrently,
    /// reconcile the survivors, and replace the persisted dataset in one
    /// transaction.
    ///
    /// The two fetches are independent reads, so they run in parallel on
    /// scoped threads with a join point here; if either fails the whole run
    /// fails - no partial reconciliation on one collection alone. Validation
    /// skips are normal filtering and never fail the run; persistence
    /// failures roll back and propagate.
    pub fn run_sync(&self, conn: &mut Connection) -> Result<SyncOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Sync run started");

        let (summaries_result, trees_result) = std::thread::scope(|scope| {
            let summaries = scope.spawn(|| self.gateway.fetch_summaries());
            let trees = scope.spawn(|| self.gateway.fetch_allocation_trees());
            (summaries.join(), trees.join())
        });

        let summaries = summaries_result
            .map_err(|_| anyhow!("Summary fetch thread panicked"))??;
        let trees = trees_result
            .map_err(|_| anyhow!("Allocation fetch thread panicked"))??;

        info!(
            run_id = %run_id,
            summaries = summaries.len(),
            trees = trees.len(),
            "Source collections fetched"
        );

        let entities = reconcile(&summaries, &trees, &self.validator);

        if entities.is_empty() {
            warn!(run_id = %run_id, "No entities survived reconciliation");
        }

        // Full replace runs even for a zero-survivor cycle: a validly empty
        // source must clear stale rows too.
        let (entity_count, row_count) = db::replace_all(conn, &entities)?;

        let message = if entity_count == 0 {
            "No data to sync".to_string()
        } else {
            format!("Synced {} entities ({} allocation rows)", entity_count, row_count)
        };

        let outcome = SyncOutcome {
            success: true,
            entities_processed: entity_count,
            rows_processed: row_count,
            errors: Vec::new(),
            message,
            run_id,
            started_at,
            finished_at: Utc::now(),
        };

        info!("{}", outcome.summary());
        Ok(outcome)
    }

    /// Read back all persisted entities with their allocation rows, ordered
    /// by entity id ascending.
    pub fn list_entities(&self, conn: &Connection) -> Result<Vec<ReconciledEntity>> {
        db::fetch_all(conn)
    }
}

// ============================================================================
// TESTS
// ============================================================================
