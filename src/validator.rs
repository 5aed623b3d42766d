// Validator - structural and business-rule checks
// Pure functions over the wire types. Summary checks accumulate every defect;
// tree checks fail fast only when the container itself is missing; pairing is
// set-based so verdicts are independent of input order.

use crate::models::{AllocationTree, PairingOutcome, PairingVerdict, Summary};
use std::collections::{HashMap, HashSet};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    fn new(context: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

// ============================================================================
// CATEGORY SET
// ============================================================================

/// Closed set of accepted summary categories. Configurable so new categories
/// can be added without touching reconciliation logic.
#[derive(Debug, Clone)]
pub struct CategorySet {
    members: HashSet<String>,
}

impl CategorySet {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategorySet {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated override, e.g. from SYNC_CATEGORIES.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    pub fn contains(&self, category: &str) -> bool {
        self.members.contains(category)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(["WEALTH", "PRIVATE_EQUITY"])
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct Validator {
    categories: CategorySet,
}

impl Validator {
    pub fn new() -> Self {
        Validator {
            categories: CategorySet::default(),
        }
    }

    pub fn with_categories(categories: CategorySet) -> Self {
        Validator { categories }
    }

    /// True iff the value is non-empty and a member of the configured set.
    pub fn validate_category(&self, value: &str) -> bool {
        !value.is_empty() && self.categories.contains(value)
    }

    /// Validate a single summary. Never short-circuits: all applicable checks
    /// run, so the caller sees the complete defect list in one pass.
    pub fn validate_summary(&self, summary: &Summary) -> ValidationResult {
        let mut errors = Vec::new();

        if summary.id.is_empty() {
            errors.push(ValidationError::new(
                "Summary",
                "id",
                "Required field is empty",
            ));
        }

        if !self.validate_category(&summary.category) {
            errors.push(ValidationError::new(
                "Summary",
                "category",
                format!("Missing or not an accepted category: '{}'", summary.category),
            ));
        }

        if summary.profit.is_none() {
            errors.push(ValidationError::new(
                "Summary",
                "profit",
                "Missing or non-numeric",
            ));
        }

        if summary.current_amount.is_none() {
            errors.push(ValidationError::new(
                "Summary",
                "currentAmount",
                "Missing or non-numeric",
            ));
        }

        if summary.invested_amount.is_none() {
            errors.push(ValidationError::new(
                "Summary",
                "investedAmount",
                "Missing or non-numeric",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a single allocation tree. A missing id or missing asset-class
    /// container makes deeper traversal meaningless, so those return
    /// immediately with a single error. Once the container is confirmed
    /// present, every node is walked and all leaf defects are collected with
    /// positional context.
    pub fn validate_allocation_tree(&self, tree: &AllocationTree) -> ValidationResult {
        if tree.id.is_empty() {
            return Err(vec![ValidationError::new(
                "AllocationTree",
                "id",
                "Required field is empty",
            )]);
        }

        let classes = match &tree.asset_classes {
            Some(classes) => classes,
            None => {
                return Err(vec![ValidationError::new(
                    "AllocationTree",
                    "assetClasses",
                    "Tree payload is absent",
                )]);
            }
        };

        let mut errors = Vec::new();

        for (ci, class) in classes.iter().enumerate() {
            if class.name.is_empty() {
                errors.push(ValidationError::new(
                    "AllocationTree",
                    format!("assetClasses[{}].name", ci),
                    "Required field is empty",
                ));
            }

            let regions = match &class.regions {
                Some(regions) => regions,
                None => {
                    errors.push(ValidationError::new(
                        "AllocationTree",
                        format!("assetClasses[{}].regions", ci),
                        "Missing or malformed region list",
                    ));
                    continue;
                }
            };

            for (ri, region) in regions.iter().enumerate() {
                let at = format!("assetClasses[{}].regions[{}]", ci, ri);

                if region.name.is_empty() {
                    errors.push(ValidationError::new(
                        "AllocationTree",
                        format!("{}.name", at),
                        "Required field is empty",
                    ));
                }

                // A region may legitimately carry no security at all; only a
                // present-but-broken security payload is a defect.
                if let Some(security) = &region.security {
                    if security.isin.is_empty() {
                        errors.push(ValidationError::new(
                            "AllocationTree",
                            format!("{}.security.isin", at),
                            "Required field is empty",
                        ));
                    }

                    if security.count.is_none() {
                        errors.push(ValidationError::new(
                            "AllocationTree",
                            format!("{}.security.count", at),
                            "Missing or non-numeric",
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Cross-set pairing: classify every id across both collections.
    /// Set-based, so verdicts are deterministic regardless of array order.
    pub fn validate_pairing(
        &self,
        summaries: &[Summary],
        trees: &[AllocationTree],
    ) -> HashMap<String, PairingOutcome> {
        let summary_ids: HashSet<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        let tree_ids: HashSet<&str> = trees.iter().map(|t| t.id.as_str()).collect();

        let mut verdicts = HashMap::new();

        for id in &summary_ids {
            if tree_ids.contains(id) {
                verdicts.insert(
                    id.to_string(),
                    PairingOutcome {
                        verdict: PairingVerdict::PairedValid,
                        errors: Vec::new(),
                    },
                );
            } else {
                verdicts.insert(
                    id.to_string(),
                    PairingOutcome {
                        verdict: PairingVerdict::OrphanSummary,
                        errors: vec![ValidationError::new(
                            "Pairing",
                            "id",
                            format!("Summary '{}' has no matching allocation tree", id),
                        )],
                    },
                );
            }
        }

        for id in &tree_ids {
            if !summary_ids.contains(id) {
                verdicts.insert(
                    id.to_string(),
                    PairingOutcome {
                        verdict: PairingVerdict::OrphanAllocation,
                        errors: vec![ValidationError::new(
                            "Pairing",
                            "id",
                            format!("Allocation tree '{}' has no matching summary", id),
                        )],
                    },
                );
            }
        }

        verdicts
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetClass, Region, Security};

    fn valid_summary(id: &str) -> Summary {
        Summary {
            id: id.to_string(),
            category: "WEALTH".to_string(),
            profit: Some(1000.0),
            current_amount: Some(5000.0),
            invested_amount: Some(4000.0),
        }
    }

    fn valid_tree(id: &str) -> AllocationTree {
        AllocationTree {
            id: id.to_string(),
            name: "Growth".to_string(),
            asset_classes: Some(vec![AssetClass {
                name: "Stocks".to_string(),
                regions: Some(vec![Region {
                    name: "US".to_string(),
                    security: Some(Security {
                        isin: "US123".to_string(),
                        count: Some(100),
                    }),
                }]),
            }]),
        }
    }

    #[test]
    fn test_validate_category() {
        let validator = Validator::new();

        assert!(validator.validate_category("WEALTH"));
        assert!(validator.validate_category("PRIVATE_EQUITY"));
        assert!(!validator.validate_category(""));
        assert!(!validator.validate_category("CRYPTO"));
    }

    #[test]
    fn test_category_set_configurable() {
        let set = CategorySet::from_csv("WEALTH, PRIVATE_EQUITY, REAL_ESTATE");
        let validator = Validator::with_categories(set);

        assert!(validator.validate_category("REAL_ESTATE"));
        assert!(!validator.validate_category("CRYPTO"));
    }

    #[test]
    fn test_validate_summary_valid() {
        let validator = Validator::new();
        assert!(validator.validate_summary(&valid_summary("p1")).is_ok());
    }

    #[test]
    fn test_validate_summary_accumulates_all_errors() {
        let validator = Validator::new();
        let mut summary = valid_summary("p1");
        summary.profit = None;
        summary.invested_amount = None;

        let errors = validator.validate_summary(&summary).unwrap_err();
        assert_eq!(
            errors.len(),
            2,
            "Two missing numeric fields should yield exactly two errors"
        );
        assert!(errors.iter().any(|e| e.field == "profit"));
        assert!(errors.iter().any(|e| e.field == "investedAmount"));
    }

    #[test]
    fn test_validate_summary_missing_id_and_bad_category() {
        let validator = Validator::new();
        let mut summary = valid_summary("");
        summary.category = "CRYPTO".to_string();

        let errors = validator.validate_summary(&summary).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "id"));
        assert!(errors.iter().any(|e| e.field == "category"));
    }

    #[test]
    fn test_validate_tree_valid() {
        let validator = Validator::new();
        assert!(validator.validate_allocation_tree(&valid_tree("p1")).is_ok());
    }

    #[test]
    fn test_validate_tree_missing_id_fails_fast() {
        let validator = Validator::new();
        let tree = valid_tree("");

        let errors = validator.validate_allocation_tree(&tree).unwrap_err();
        assert_eq!(errors.len(), 1, "Missing id should be the single error");
        assert_eq!(errors[0].field, "id");
    }

    #[test]
    fn test_validate_tree_missing_payload_fails_fast() {
        let validator = Validator::new();
        let mut tree = valid_tree("p1");
        tree.asset_classes = None;

        let errors = validator.validate_allocation_tree(&tree).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "assetClasses");
    }

    #[test]
    fn test_validate_tree_collects_all_leaf_defects() {
        let validator = Validator::new();
        let tree = AllocationTree {
            id: "p1".to_string(),
            name: "Broken".to_string(),
            asset_classes: Some(vec![
                AssetClass {
                    name: String::new(), // defect 1
                    regions: Some(vec![Region {
                        name: String::new(), // defect 2
                        security: Some(Security {
                            isin: String::new(), // defect 3
                            count: None,         // defect 4
                        }),
                    }]),
                },
                AssetClass {
                    name: "Bonds".to_string(),
                    regions: None, // defect 5
                },
            ]),
        };

        let errors = validator.validate_allocation_tree(&tree).unwrap_err();
        assert_eq!(errors.len(), 5, "All defects across the tree reported together");
        assert!(errors
            .iter()
            .any(|e| e.field == "assetClasses[0].regions[0].security.isin"));
        assert!(errors.iter().any(|e| e.field == "assetClasses[1].regions"));
    }

    #[test]
    fn test_validate_tree_security_less_region_is_not_a_defect() {
        let validator = Validator::new();
        let mut tree = valid_tree("p1");
        tree.asset_classes.as_mut().unwrap()[0]
            .regions
            .as_mut()
            .unwrap()
            .push(Region {
                name: "EU".to_string(),
                security: None,
            });

        assert!(validator.validate_allocation_tree(&tree).is_ok());
    }

    #[test]
    fn test_validate_pairing_partitions_id_sets() {
        let validator = Validator::new();
        let summaries = vec![valid_summary("a"), valid_summary("b")];
        let trees = vec![valid_tree("b"), valid_tree("c")];

        let verdicts = validator.validate_pairing(&summaries, &trees);

        assert_eq!(verdicts.len(), 3, "Verdicts cover S ∪ T exactly");
        assert_eq!(verdicts["a"].verdict, PairingVerdict::OrphanSummary);
        assert_eq!(verdicts["b"].verdict, PairingVerdict::PairedValid);
        assert_eq!(verdicts["c"].verdict, PairingVerdict::OrphanAllocation);

        assert!(verdicts["b"].errors.is_empty());
        assert_eq!(verdicts["a"].errors.len(), 1);
        assert_eq!(verdicts["c"].errors.len(), 1);
    }

    #[test]
    fn test_validate_pairing_order_independent() {
        let validator = Validator::new();
        let summaries = vec![valid_summary("a"), valid_summary("b")];
        let trees = vec![valid_tree("b"), valid_tree("c")];

        let forward = validator.validate_pairing(&summaries, &trees);

        let summaries_rev: Vec<_> = summaries.into_iter().rev().collect();
        let trees_rev: Vec<_> = trees.into_iter().rev().collect();
        let reversed = validator.validate_pairing(&summaries_rev, &trees_rev);

        assert_eq!(forward.len(), reversed.len());
        for (id, outcome) in &forward {
            assert_eq!(outcome.verdict, reversed[id].verdict);
        }
    }
}
