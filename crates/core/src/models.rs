use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intent labels produced by the external classifier. `Unclear` is a real
/// label; it is absent from the default routing table and clarifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    PfaD212Filing,
    PfaCasCass,
    PropertySaleTax,
    RentalContractRegistration,
    FiscalCertificate,
    EfacturaB2b,
    EfacturaB2c,
    GeneralQuestion,
    Unclear,
}

impl IntentLabel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pfa_d212_filing" => Some(Self::PfaD212Filing),
            "pfa_cas_cass" => Some(Self::PfaCasCass),
            "property_sale_tax" => Some(Self::PropertySaleTax),
            "rental_contract_registration" => Some(Self::RentalContractRegistration),
            "fiscal_certificate" => Some(Self::FiscalCertificate),
            "efactura_b2b" => Some(Self::EfacturaB2b),
            "efactura_b2c" => Some(Self::EfacturaB2c),
            "general_question" => Some(Self::GeneralQuestion),
            "unclear" => Some(Self::Unclear),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::PfaD212Filing => "pfa_d212_filing",
            Self::PfaCasCass => "pfa_cas_cass",
            Self::PropertySaleTax => "property_sale_tax",
            Self::RentalContractRegistration => "rental_contract_registration",
            Self::FiscalCertificate => "fiscal_certificate",
            Self::EfacturaB2b => "efactura_b2b",
            Self::EfacturaB2c => "efactura_b2c",
            Self::GeneralQuestion => "general_question",
            Self::Unclear => "unclear",
        }
    }
}

/// Target handlers for dispatched requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    Pfa,
    PropertySale,
    RentalIncome,
    FiscalCertificate,
    EInvoice,
    GeneralGuidance,
}

impl HandlerId {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Pfa => "pfa",
            Self::PropertySale => "property_sale",
            Self::RentalIncome => "rental_income",
            Self::FiscalCertificate => "fiscal_certificate",
            Self::EInvoice => "e_invoice",
            Self::GeneralGuidance => "general_guidance",
        }
    }
}

/// Entities the upstream classifier may extract from the user message.
/// Handlers decide what they need and report what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedEntities {
    pub annual_income: Option<f64>,
    pub property_value: Option<f64>,
    pub ownership_years: Option<u32>,
    pub monthly_rent: Option<f64>,
    pub invoice_type: Option<String>,
    pub taxpayer_id: Option<String>,
    pub seller_id: Option<String>,
    pub certificate_type: Option<String>,
}

/// One classification result for one user turn; consumed once by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub label: IntentLabel,
    pub confidence: f64,
    #[serde(default)]
    pub entities: ExtractedEntities,
}

impl IntentClassification {
    pub fn new(label: IntentLabel, confidence: f64) -> Self {
        Self {
            label,
            confidence,
            entities: ExtractedEntities::default(),
        }
    }

    pub fn with_entities(mut self, entities: ExtractedEntities) -> Self {
        self.entities = entities;
        self
    }
}

/// Outcome of the routing decision engine. The handler id exists exactly
/// when the outcome is a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "handler")]
pub enum RoutingDecision {
    Dispatch(HandlerId),
    Clarify,
}

impl RoutingDecision {
    pub fn is_clarify(&self) -> bool {
        matches!(self, Self::Clarify)
    }

    pub fn handler(&self) -> Option<HandlerId> {
        match self {
            Self::Dispatch(handler) => Some(*handler),
            Self::Clarify => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    PfaContributions,
    PropertySaleTax,
    RentalIncomeTax,
}

impl CalculationType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pfa_contributions" => Some(Self::PfaContributions),
            "property_sale_tax" => Some(Self::PropertySaleTax),
            "rental_income_tax" => Some(Self::RentalIncomeTax),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::PfaContributions => "pfa_contributions",
            Self::PropertySaleTax => "property_sale_tax",
            Self::RentalIncomeTax => "rental_income_tax",
        }
    }
}

/// A calculation request: a type tag plus a field-name input map. The
/// engine type- and range-checks every field before computing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub calculation_type: CalculationType,
    pub inputs: Map<String, Value>,
}

impl CalculationRequest {
    pub fn new(calculation_type: CalculationType) -> Self {
        Self {
            calculation_type,
            inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(field.to_string(), value.into());
        self
    }

    pub fn pfa_contributions(annual_income: f64) -> Self {
        Self::new(CalculationType::PfaContributions).with_input("annual_income", annual_income)
    }

    pub fn property_sale_tax(sale_price: f64, ownership_years: u32) -> Self {
        Self::new(CalculationType::PropertySaleTax)
            .with_input("sale_price", sale_price)
            .with_input("ownership_years", ownership_years)
    }

    pub fn rental_income_tax(annual_rental_income: f64) -> Self {
        Self::new(CalculationType::RentalIncomeTax)
            .with_input("annual_rental_income", annual_rental_income)
    }
}

/// The legal basis a calculation ran under: the rule-table version plus
/// every rate that entered the arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationBasis {
    pub rules_version: String,
    pub rates: BTreeMap<String, f64>,
}

/// Immutable calculation outcome. Ordered maps keep serialization of the
/// same result byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub calculation_type: CalculationType,
    pub outputs: BTreeMap<String, f64>,
    pub applied: Vec<String>,
    pub basis: CalculationBasis,
}

impl CalculationResult {
    pub fn output(&self, name: &str) -> Option<f64> {
        self.outputs.get(name).copied()
    }
}
