// Persister - SQLite storage for reconciled entities and their
// allocation rows. Writes are a single transaction implementing the
// full-replace policy: every sync is a complete, idempotent snapshot of the
// source's current state, never a partial merge.

use crate::models::{FlattenedAllocation, ReconciledEntity};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Entities Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            profit REAL NOT NULL,
            current_amount REAL NOT NULL,
            invested_amount REAL NOT NULL,
            synced_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Allocations Table (child rows; row_key is the stable derived identifier)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS allocations (
            row_key TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL REFERENCES entities(id),
            asset_class TEXT NOT NULL,
            region TEXT NOT NULL,
            isin TEXT NOT NULL,
            security_count INTEGER NOT NULL,
            position INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_allocations_entity ON allocations(entity_id, position)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_category ON entities(category)",
        [],
    )?;

    Ok(())
}

/// Replace the entire persisted dataset with the given entities, atomically.
///
/// One transaction: delete all allocation rows, then all entities
/// (child-before-parent), then insert each entity and its rows. Any failure
/// aborts the whole transaction - the early return drops the uncommitted
/// rusqlite transaction, which rolls back, and the error propagates to the
/// caller. No partial write survives.
///
/// Returns (entities written, rows written) on success; the caller assembles
/// the run-level outcome.
pub fn replace_all(
    conn: &mut Connection,
    entities: &[ReconciledEntity],
) -> Result<(usize, usize)> {
    let synced_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("Failed to open transaction")?;

    tx.execute("DELETE FROM allocations", [])
        .context("Failed to clear allocation rows")?;
    tx.execute("DELETE FROM entities", [])
        .context("Failed to clear entities")?;

    let mut entity_count = 0;
    let mut row_count = 0;

    for entity in entities {
        tx.execute(
            "INSERT INTO entities (
                id, category, profit, current_amount, invested_amount, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entity.id,
                entity.category,
                entity.profit,
                entity.current_amount,
                entity.invested_amount,
                synced_at,
            ],
        )
        .with_context(|| format!("Failed to insert entity '{}'", entity.id))?;
        entity_count += 1;

        for (position, row) in entity.allocations.iter().enumerate() {
            tx.execute(
                "INSERT INTO allocations (
                    row_key, entity_id, asset_class, region, isin, security_count, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.row_key(),
                    row.entity_id,
                    row.asset_class,
                    row.region,
                    row.isin,
                    row.count,
                    position as i64,
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to insert allocation row {} for entity '{}'",
                    position, entity.id
                )
            })?;
            row_count += 1;
        }
    }

    tx.commit().context("Failed to commit sync transaction")?;

    info!(entities = entity_count, rows = row_count, "Replaced persisted dataset");
    Ok((entity_count, row_count))
}

/// Read back all persisted entities with their child rows attached, ordered
/// by entity id ascending - stable and independent of insertion order. Rows
/// come back in stored position (document) order.
pub fn fetch_all(conn: &Connection) -> Result<Vec<ReconciledEntity>> {
    let mut entity_stmt = conn.prepare(
        "SELECT id, category, profit, current_amount, invested_amount
         FROM entities
         ORDER BY id ASC",
    )?;

    let mut entities = entity_stmt
        .query_map([], |row| {
            Ok(ReconciledEntity {
                id: row.get(0)?,
                category: row.get(1)?,
                profit: row.get(2)?,
                current_amount: row.get(3)?,
                invested_amount: row.get(4)?,
                allocations: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut row_stmt = conn.prepare(
        "SELECT entity_id, asset_class, region, isin, security_count
         FROM allocations
         WHERE entity_id = ?1
         ORDER BY position ASC",
    )?;

    for entity in &mut entities {
        entity.allocations = row_stmt
            .query_map(params![entity.id], |row| {
                Ok(FlattenedAllocation {
                    entity_id: row.get(0)?,
                    asset_class: row.get(1)?,
                    region: row.get(2)?,
                    isin: row.get(3)?,
                    count: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(entities)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================
