// Reconciler - merge matched (summary, allocation-tree) pairs into
// flattened output records. Pairing runs as an explicit pre-pass; each
// summary then passes through the gate sequence independently, so one
// entity's rejection never affects another's inclusion.

use crate::models::{AllocationTree, FlattenedAllocation, ReconciledEntity, Summary};
use crate::validator::Validator;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

// ============================================================================
// FLATTEN
// ============================================================================

/// Expand an allocation tree into leaf rows: every asset class, then every
/// nested region, in document order. A region without a security leaf is
/// silently skipped, as is a security with no usable count - only complete
/// leaves produce rows, so callers outside the validated pipeline get no
/// fabricated values. Lazy: nothing is walked until the iterator is
/// consumed, and the iterator restarts cleanly from a fresh call.
pub fn flatten(tree: &AllocationTree) -> impl Iterator<Item = FlattenedAllocation> + '_ {
    tree.asset_classes
        .iter()
        .flatten()
        .flat_map(move |class| {
            class
                .regions
                .iter()
                .flatten()
                .filter_map(move |region| {
                    let security = region.security.as_ref()?;
                    let count = security.count?;
                    Some(FlattenedAllocation {
                        entity_id: tree.id.clone(),
                        asset_class: class.name.clone(),
                        region: region.name.clone(),
                        isin: security.isin.clone(),
                        count,
                    })
                })
        })
}

// ============================================================================
// RECONCILE
// ============================================================================

/// Merge the two collections into reconciled entities.
///
/// For each summary, in input order:
///   1. pairing verdict must be paired-valid
///   2. the summary must pass field validation
///   3. the matched tree must be present (defensive; pairing already checked)
///   4. the tree must pass field validation
///   5. flattening must yield at least one row
///
/// Output order equals input summary order restricted to survivors.
/// Duplicate ids: the tree index is last-wins; a summary id already
/// reconciled is skipped with a warning (first-wins), so no two output
/// entities share an id.
pub fn reconcile(
    summaries: &[Summary],
    trees: &[AllocationTree],
    validator: &Validator,
) -> Vec<ReconciledEntity> {
    let verdicts = validator.validate_pairing(summaries, trees);

    // Last-wins by construction: a later duplicate overwrites the map entry.
    let tree_index: HashMap<&str, &AllocationTree> =
        trees.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut entities = Vec::new();

    for summary in summaries {
        if !seen_ids.insert(summary.id.as_str()) {
            warn!(id = %summary.id, "Skipping duplicate summary id (first occurrence wins)");
            continue;
        }

        match verdicts.get(&summary.id) {
            Some(outcome) if outcome.is_paired() => {}
            Some(outcome) => {
                for error in &outcome.errors {
                    warn!(id = %summary.id, "Skipping unpaired entity: {}", error);
                }
                continue;
            }
            None => {
                warn!(id = %summary.id, "Skipping entity with no pairing verdict");
                continue;
            }
        }

        if let Err(errors) = validator.validate_summary(summary) {
            for error in &errors {
                warn!(id = %summary.id, "Skipping entity with invalid summary: {}", error);
            }
            continue;
        }

        let tree = match tree_index.get(summary.id.as_str()) {
            Some(tree) => *tree,
            None => {
                warn!(id = %summary.id, "Skipping entity: paired but tree not found");
                continue;
            }
        };

        if let Err(errors) = validator.validate_allocation_tree(tree) {
            for error in &errors {
                warn!(id = %summary.id, "Skipping entity with invalid allocation tree: {}", error);
            }
            continue;
        }

        let allocations: Vec<FlattenedAllocation> = flatten(tree).collect();
        if allocations.is_empty() {
            warn!(id = %summary.id, "Skipping entity: allocation tree flattened to zero rows");
            continue;
        }

        debug!(id = %summary.id, rows = allocations.len(), "Entity reconciled");

        // Numerics are guaranteed present after validate_summary.
        entities.push(ReconciledEntity {
            id: summary.id.clone(),
            category: summary.category.clone(),
            profit: summary.profit.unwrap_or(0.0),
            current_amount: summary.current_amount.unwrap_or(0.0),
            invested_amount: summary.invested_amount.unwrap_or(0.0),
            allocations,
        });
    }

    entities
}

// ============================================================================
// TESTS
// ============================================================================
