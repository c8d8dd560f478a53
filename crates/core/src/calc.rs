use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{CalculationBasis, CalculationRequest, CalculationResult, CalculationType};
use crate::rules::RuleTable;

/// Typed rejection for calculation inputs. Every variant is caused by
/// caller-supplied data and the same bad input always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("required field `{0}` is missing")]
    Missing(&'static str),
    #[error("field `{0}` must be a finite number")]
    NotNumeric(&'static str),
    #[error("field `{field}` is out of domain: {constraint}")]
    OutOfDomain {
        field: &'static str,
        constraint: &'static str,
    },
}

/// Computes one calculation against one rule-table snapshot.
///
/// Pure and deterministic: identical request and table version produce a
/// byte-identical result, and nothing is cached or clamped. Inputs are
/// rejected before any arithmetic runs.
pub fn calculate(
    request: &CalculationRequest,
    rules: &RuleTable,
) -> Result<CalculationResult, InvalidInput> {
    match request.calculation_type {
        CalculationType::PfaContributions => pfa_contributions(request, rules),
        CalculationType::PropertySaleTax => property_sale_tax(request, rules),
        CalculationType::RentalIncomeTax => rental_income_tax(request, rules),
    }
}

/// CAS is owed on 12 minimum salaries once income reaches that threshold;
/// CASS on 6. The two thresholds are evaluated independently, and both
/// contributions are computed on the threshold, never on actual income.
fn pfa_contributions(
    request: &CalculationRequest,
    rules: &RuleTable,
) -> Result<CalculationResult, InvalidInput> {
    let annual_income = require_amount(request, "annual_income")?;

    let cas_threshold = rules.cas_threshold();
    let cass_threshold = rules.cass_threshold();

    let mut applied = Vec::new();

    let cas_amount = if annual_income >= cas_threshold {
        applied.push("cas".to_string());
        round_to_bani(rules.cas_rate * cas_threshold)
    } else {
        0.0
    };

    let cass_amount = if annual_income >= cass_threshold {
        applied.push("cass".to_string());
        round_to_bani(rules.cass_rate * cass_threshold)
    } else {
        0.0
    };

    let mut outputs = BTreeMap::new();
    outputs.insert("cas_amount".to_string(), cas_amount);
    outputs.insert("cass_amount".to_string(), cass_amount);
    outputs.insert("cas_threshold".to_string(), cas_threshold);
    outputs.insert("cass_threshold".to_string(), cass_threshold);
    outputs.insert(
        "total_contributions".to_string(),
        round_to_bani(cas_amount + cass_amount),
    );

    Ok(CalculationResult {
        calculation_type: CalculationType::PfaContributions,
        outputs,
        applied,
        basis: basis(
            rules,
            [
                ("cas_rate", rules.cas_rate),
                ("cass_rate", rules.cass_rate),
                ("minimum_gross_salary", rules.minimum_gross_salary),
            ],
        ),
    })
}

/// Tier selection by ownership duration; exactly at the boundary counts as
/// long-held and takes the low rate.
fn property_sale_tax(
    request: &CalculationRequest,
    rules: &RuleTable,
) -> Result<CalculationResult, InvalidInput> {
    let sale_price = require_amount(request, "sale_price")?;
    let ownership_years = require_years(request, "ownership_years")?;

    let (rate, tier) = if ownership_years >= rules.property_long_ownership_min_years {
        (rules.property_long_ownership_rate, "long_ownership")
    } else {
        (rules.property_short_ownership_rate, "short_ownership")
    };

    let mut outputs = BTreeMap::new();
    outputs.insert("tax_amount".to_string(), round_to_bani(rate * sale_price));
    outputs.insert("rate_applied".to_string(), rate);

    Ok(CalculationResult {
        calculation_type: CalculationType::PropertySaleTax,
        outputs,
        applied: vec![tier.to_string()],
        basis: basis(rules, [("rate_applied", rate)]),
    })
}

fn rental_income_tax(
    request: &CalculationRequest,
    rules: &RuleTable,
) -> Result<CalculationResult, InvalidInput> {
    let annual_rental_income = require_amount(request, "annual_rental_income")?;

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "tax_amount".to_string(),
        round_to_bani(rules.rental_flat_rate * annual_rental_income),
    );

    Ok(CalculationResult {
        calculation_type: CalculationType::RentalIncomeTax,
        outputs,
        applied: Vec::new(),
        basis: basis(rules, [("rental_flat_rate", rules.rental_flat_rate)]),
    })
}

fn basis(
    rules: &RuleTable,
    rates: impl IntoIterator<Item = (&'static str, f64)>,
) -> CalculationBasis {
    CalculationBasis {
        rules_version: rules.version.clone(),
        rates: rates
            .into_iter()
            .map(|(name, rate)| (name.to_string(), rate))
            .collect(),
    }
}

fn require_amount(request: &CalculationRequest, field: &'static str) -> Result<f64, InvalidInput> {
    let value = request
        .inputs
        .get(field)
        .ok_or(InvalidInput::Missing(field))?;
    let amount = value.as_f64().ok_or(InvalidInput::NotNumeric(field))?;

    if !amount.is_finite() {
        return Err(InvalidInput::NotNumeric(field));
    }
    if amount < 0.0 {
        return Err(InvalidInput::OutOfDomain {
            field,
            constraint: "must not be negative",
        });
    }

    Ok(amount)
}

fn require_years(request: &CalculationRequest, field: &'static str) -> Result<u32, InvalidInput> {
    let value = request
        .inputs
        .get(field)
        .ok_or(InvalidInput::Missing(field))?;
    let number = value.as_f64().ok_or(InvalidInput::NotNumeric(field))?;

    if !number.is_finite() {
        return Err(InvalidInput::NotNumeric(field));
    }
    if number < 0.0 {
        return Err(InvalidInput::OutOfDomain {
            field,
            constraint: "must not be negative",
        });
    }
    if number.fract() != 0.0 || number > f64::from(u32::MAX) {
        return Err(InvalidInput::OutOfDomain {
            field,
            constraint: "must be a whole number of years",
        });
    }

    Ok(number as u32)
}

/// Monetary outputs are settled to bani so repeated evaluations of the
/// same request serialize identically.
fn round_to_bani(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
