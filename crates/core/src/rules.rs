use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Versioned, immutable snapshot of the legal parameters every calculation
/// runs under. A legislative change ships a new table, not a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: String,
    pub valid_from: NaiveDate,
    pub minimum_gross_salary: f64,
    pub cas_rate: f64,
    pub cass_rate: f64,
    pub cas_threshold_multiple: u32,
    pub cass_threshold_multiple: u32,
    pub property_long_ownership_rate: f64,
    pub property_short_ownership_rate: f64,
    pub property_long_ownership_min_years: u32,
    pub rental_flat_rate: f64,
}

impl Default for RuleTable {
    /// Simplified 2024 values: minimum gross salary 3300 RON, CAS 25% over
    /// 12 minimum salaries, CASS 10% over 6, property sale 1%/3% around the
    /// 3-year boundary, rental income flat 10%.
    fn default() -> Self {
        Self {
            version: "2024.1".to_string(),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid calendar date"),
            minimum_gross_salary: 3300.0,
            cas_rate: 0.25,
            cass_rate: 0.10,
            cas_threshold_multiple: 12,
            cass_threshold_multiple: 6,
            property_long_ownership_rate: 0.01,
            property_short_ownership_rate: 0.03,
            property_long_ownership_min_years: 3,
            rental_flat_rate: 0.10,
        }
    }
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to parse rule table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rule table `{version}` rejected: {reason}")]
    Invalid { version: String, reason: String },
}

impl RuleTable {
    pub fn from_json_str(raw: &str) -> Result<Self, RulesError> {
        let table: RuleTable = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    /// Sanity-checks a table before it is published. Rates must be
    /// fractions, the salary positive, multiples non-zero.
    pub fn validate(&self) -> Result<(), RulesError> {
        let reject = |reason: &str| RulesError::Invalid {
            version: self.version.clone(),
            reason: reason.to_string(),
        };

        if self.version.trim().is_empty() {
            return Err(reject("version must not be empty"));
        }
        if !self.minimum_gross_salary.is_finite() || self.minimum_gross_salary <= 0.0 {
            return Err(reject("minimum_gross_salary must be positive"));
        }
        for (name, rate) in [
            ("cas_rate", self.cas_rate),
            ("cass_rate", self.cass_rate),
            (
                "property_long_ownership_rate",
                self.property_long_ownership_rate,
            ),
            (
                "property_short_ownership_rate",
                self.property_short_ownership_rate,
            ),
            ("rental_flat_rate", self.rental_flat_rate),
        ] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(reject(&format!("{name} must be a fraction in [0, 1]")));
            }
        }
        if self.cas_threshold_multiple == 0 || self.cass_threshold_multiple == 0 {
            return Err(reject("threshold multiples must be non-zero"));
        }

        Ok(())
    }

    pub fn cas_threshold(&self) -> f64 {
        self.minimum_gross_salary * f64::from(self.cas_threshold_multiple)
    }

    pub fn cass_threshold(&self) -> f64 {
        self.minimum_gross_salary * f64::from(self.cass_threshold_multiple)
    }
}

/// Shared holder for the current rule-table snapshot.
///
/// A reload publishes a fresh `Arc`; snapshots already handed out stay
/// untouched, so in-flight calculations keep the version they started with.
#[derive(Clone)]
pub struct RulesHandle {
    current: Arc<RwLock<Arc<RuleTable>>>,
}

impl RulesHandle {
    pub fn new(table: RuleTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn current(&self) -> Arc<RuleTable> {
        self.current.read().clone()
    }

    pub fn reload(&self, table: RuleTable) {
        *self.current.write() = Arc::new(table);
    }
}

impl Default for RulesHandle {
    fn default() -> Self {
        Self::new(RuleTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_passes_validation() {
        assert!(RuleTable::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let table = RuleTable {
            cas_rate: 1.5,
            ..RuleTable::default()
        };

        assert!(matches!(
            table.validate(),
            Err(RulesError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            RuleTable::from_json_str("{ not json"),
            Err(RulesError::Parse(_))
        ));
    }

    #[test]
    fn json_round_trip_preserves_the_table() {
        let table = RuleTable::default();
        let raw = serde_json::to_string(&table).expect("table should serialize");

        assert_eq!(RuleTable::from_json_str(&raw).expect("should parse"), table);
    }

    #[test]
    fn reload_leaves_existing_snapshots_untouched() {
        let handle = RulesHandle::default();
        let before = handle.current();

        let mut updated = RuleTable::default();
        updated.version = "2025.1".to_string();
        updated.minimum_gross_salary = 3700.0;
        handle.reload(updated);

        assert_eq!(before.version, "2024.1");
        assert_eq!(before.minimum_gross_salary, 3300.0);
        assert_eq!(handle.current().version, "2025.1");
    }
}
