// Data model - wire types from the source API and reconciled output types
// Wire types keep Option fields where the source may omit or mistype a value,
// so a single bad record becomes a validation defect instead of a failed fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Absorb a non-numeric wire value into None instead of failing the whole
/// collection: the defect belongs to one entity and is reported by the
/// validator, not by the fetch.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

// ============================================================================
// SOURCE WIRE TYPES (immutable once fetched; lifetime = one sync cycle)
// ============================================================================

/// Per-entity financial summary as delivered by the source API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub category: String,

    /// May be negative. None = missing or non-numeric on the wire.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub profit: Option<f64>,

    /// ≥ 0 expected but not enforced.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_amount: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub invested_amount: Option<f64>,
}

/// Three-level allocation breakdown: asset class → region → security leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationTree {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub asset_classes: Option<Vec<AssetClass>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetClass {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub regions: Option<Vec<Region>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub name: String,

    /// At most one security leaf. A region without one is a valid state,
    /// not a defect: it simply contributes no flattened row.
    #[serde(default)]
    pub security: Option<Security>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    #[serde(default)]
    pub isin: String,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub count: Option<i64>,
}

// ============================================================================
// RECONCILED OUTPUT TYPES
// ============================================================================

/// One leaf-level row from an allocation tree's AssetClass × Region expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedAllocation {
    pub entity_id: String,
    pub asset_class: String,
    pub region: String,
    pub isin: String,
    pub count: i64,
}

impl FlattenedAllocation {
    /// Stable derived key used downstream as the unique row identifier.
    /// Derived from the identifying tuple, never from the count, so a count
    /// correction at the source maps to the same row.
    pub fn row_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.entity_id, self.asset_class, self.region, self.isin
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// The accepted output unit: exists iff a valid Summary and a valid
/// AllocationTree were paired for this id AND at least one allocation row
/// survived flattening. Constructed fresh each sync cycle, never mutated,
/// superseded (not merged) by the next cycle's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledEntity {
    pub id: String,
    pub category: String,
    pub profit: f64,
    pub current_amount: f64,
    pub invested_amount: f64,
    /// Non-empty, in flatten (document) order.
    pub allocations: Vec<FlattenedAllocation>,
}

// ============================================================================
// PAIRING
// ============================================================================

/// Per-id classification built once per sync cycle from the full id sets of
/// both input collections; gates inclusion before per-field validation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingVerdict {
    /// Id present in both collections.
    PairedValid,
    /// Summary id with no matching allocation tree.
    OrphanSummary,
    /// Allocation tree id with no matching summary.
    OrphanAllocation,
}

#[derive(Debug, Clone)]
pub struct PairingOutcome {
    pub verdict: PairingVerdict,
    pub errors: Vec<crate::validator::ValidationError>,
}

impl PairingOutcome {
    pub fn is_paired(&self) -> bool {
        self.verdict == PairingVerdict::PairedValid
    }
}

// ============================================================================
// SYNC OUTCOME
// ============================================================================

/// Result of one full sync run. Skipping invalid entities is normal
/// filtering, not failure: success stays true as long as the run itself
/// completed. A zero-survivor run is the "no data to sync" condition,
/// still success = true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub entities_processed: usize,
    pub rows_processed: usize,
    pub errors: Vec<String>,
    pub message: String,
    /// Run identity for log correlation.
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn is_empty_run(&self) -> bool {
        self.success && self.entities_processed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Sync {}: {} entities, {} rows - {}",
            self.run_id, self.entities_processed, self.rows_processed, self.message
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> FlattenedAllocation {
        FlattenedAllocation {
            entity_id: "p1".to_string(),
            asset_class: "Stocks".to_string(),
            region: "US".to_string(),
            isin: "US123".to_string(),
            count: 100,
        }
    }

    #[test]
    fn test_row_key_stable_and_count_independent() {
        let row = sample_row();
        let key1 = row.row_key();
        let key2 = row.row_key();
        assert_eq!(key1, key2, "Same row should produce same key");
        assert_eq!(key1.len(), 64, "SHA-256 key should be 64 hex characters");

        let mut corrected = sample_row();
        corrected.count = 250;
        assert_eq!(
            key1,
            corrected.row_key(),
            "Count changes must not change row identity"
        );
    }

    #[test]
    fn test_row_key_distinguishes_tuple_fields() {
        let row = sample_row();
        let mut other_region = sample_row();
        other_region.region = "EU".to_string();
        assert_ne!(row.row_key(), other_region.row_key());
    }

    #[test]
    fn test_summary_deserializes_with_missing_numerics() {
        let json = r#"{"id":"p1","category":"WEALTH","profit":1000.0}"#;
        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.id, "p1");
        assert_eq!(summary.profit, Some(1000.0));
        assert!(summary.current_amount.is_none());
        assert!(summary.invested_amount.is_none());
    }

    #[test]
    fn test_mistyped_profit_does_not_fail_the_collection() {
        // One record carries a string where a number belongs; the whole
        // collection must still deserialize, with the defect surfaced as
        // None for the validator to report against that entity alone.
        let json = r#"[
            {"id":"bad","category":"WEALTH","profit":"oops","currentAmount":1.0,"investedAmount":2.0},
            {"id":"good","category":"WEALTH","profit":1000.0,"currentAmount":5000.0,"investedAmount":4000.0}
        ]"#;

        let summaries: Vec<Summary> = serde_json::from_str(json).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].profit.is_none(), "Non-numeric profit becomes None");
        assert_eq!(summaries[1].profit, Some(1000.0), "Valid sibling unaffected");
    }

    #[test]
    fn test_mistyped_count_does_not_fail_the_collection() {
        let json = r#"[{
            "id": "p1",
            "name": "Growth",
            "assetClasses": [
                {"name": "Stocks", "regions": [
                    {"name": "US", "security": {"isin": "US123", "count": "many"}}
                ]}
            ]
        }]"#;

        let trees: Vec<AllocationTree> = serde_json::from_str(json).unwrap();
        assert_eq!(trees.len(), 1);
        let classes = trees[0].asset_classes.as_ref().unwrap();
        let security = classes[0].regions.as_ref().unwrap()[0]
            .security
            .as_ref()
            .unwrap();
        assert_eq!(security.isin, "US123");
        assert!(security.count.is_none(), "Non-numeric count becomes None");
    }

    #[test]
    fn test_allocation_tree_wire_shape() {
        let json = r#"{
            "id": "p1",
            "name": "Growth",
            "assetClasses": [
                {"name": "Stocks", "regions": [
                    {"name": "US", "security": {"isin": "US123", "count": 100}},
                    {"name": "EU"}
                ]}
            ]
        }"#;
        let tree: AllocationTree = serde_json::from_str(json).unwrap();
        let classes = tree.asset_classes.unwrap();
        assert_eq!(classes.len(), 1);
        let regions = classes[0].regions.as_ref().unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].security.is_some());
        assert!(regions[1].security.is_none(), "Security-less region is valid");
    }
}
