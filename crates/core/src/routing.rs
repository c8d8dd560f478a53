use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{HandlerId, IntentClassification, IntentLabel, RoutingDecision};

/// Minimum classifier confidence required to dispatch without asking the
/// user to clarify. Inclusive on the accept side.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Declarative intent-to-handler mapping.
///
/// The table is plain data: deployments can ship a replacement as JSON and
/// add intents without touching the decision logic. Several labels may
/// share one handler (both PFA sub-intents route to the PFA handler).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    pub confidence_threshold: f64,
    pub routes: HashMap<IntentLabel, HandlerId>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFIDENCE_THRESHOLD,
            [
                (IntentLabel::PfaD212Filing, HandlerId::Pfa),
                (IntentLabel::PfaCasCass, HandlerId::Pfa),
                (IntentLabel::PropertySaleTax, HandlerId::PropertySale),
                (
                    IntentLabel::RentalContractRegistration,
                    HandlerId::RentalIncome,
                ),
                (IntentLabel::FiscalCertificate, HandlerId::FiscalCertificate),
                (IntentLabel::EfacturaB2b, HandlerId::EInvoice),
                (IntentLabel::EfacturaB2c, HandlerId::EInvoice),
                (IntentLabel::GeneralQuestion, HandlerId::GeneralGuidance),
            ],
        )
    }
}

impl RoutingTable {
    pub fn new(
        confidence_threshold: f64,
        routes: impl IntoIterator<Item = (IntentLabel, HandlerId)>,
    ) -> Self {
        Self {
            confidence_threshold,
            routes: routes.into_iter().collect(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Maps a classification to a routing decision.
    ///
    /// Pure and total: every classification yields a decision. Low or
    /// non-finite confidence clarifies regardless of label; an unrouted
    /// label clarifies regardless of confidence. Confidence exactly at the
    /// threshold dispatches.
    pub fn decide(&self, classification: &IntentClassification) -> RoutingDecision {
        if !classification.confidence.is_finite()
            || classification.confidence < self.confidence_threshold
        {
            return RoutingDecision::Clarify;
        }

        match self.routes.get(&classification.label) {
            Some(handler) => RoutingDecision::Dispatch(*handler),
            None => RoutingDecision::Clarify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(label: IntentLabel, confidence: f64) -> IntentClassification {
        IntentClassification::new(label, confidence)
    }

    #[test]
    fn confident_known_label_dispatches() {
        let table = RoutingTable::default();

        let decision = table.decide(&classified(IntentLabel::PropertySaleTax, 0.92));
        assert_eq!(decision, RoutingDecision::Dispatch(HandlerId::PropertySale));
    }

    #[test]
    fn pfa_sub_intents_share_one_handler() {
        let table = RoutingTable::default();

        for label in [IntentLabel::PfaD212Filing, IntentLabel::PfaCasCass] {
            assert_eq!(
                table.decide(&classified(label, 0.95)),
                RoutingDecision::Dispatch(HandlerId::Pfa)
            );
        }
    }

    #[test]
    fn low_confidence_clarifies_regardless_of_label() {
        let table = RoutingTable::default();

        let decision = table.decide(&classified(IntentLabel::PfaCasCass, 0.69));
        assert_eq!(decision, RoutingDecision::Clarify);
    }

    #[test]
    fn threshold_is_inclusive_on_the_accept_side() {
        let table = RoutingTable::default();

        let decision = table.decide(&classified(IntentLabel::RentalContractRegistration, 0.70));
        assert_eq!(
            decision,
            RoutingDecision::Dispatch(HandlerId::RentalIncome)
        );
    }

    #[test]
    fn unrouted_label_clarifies_even_with_high_confidence() {
        let table = RoutingTable::default();

        let decision = table.decide(&classified(IntentLabel::Unclear, 0.99));
        assert_eq!(decision, RoutingDecision::Clarify);
    }

    #[test]
    fn non_finite_confidence_clarifies() {
        let table = RoutingTable::default();

        for confidence in [f64::NAN, f64::INFINITY] {
            assert_eq!(
                table.decide(&classified(IntentLabel::GeneralQuestion, confidence)),
                RoutingDecision::Clarify
            );
        }
    }

    #[test]
    fn table_loaded_from_json_drives_decisions() {
        let raw = r#"{
            "confidence_threshold": 0.5,
            "routes": { "general_question": "pfa" }
        }"#;
        let table = RoutingTable::from_json_str(raw).expect("table should parse");

        assert_eq!(
            table.decide(&classified(IntentLabel::GeneralQuestion, 0.55)),
            RoutingDecision::Dispatch(HandlerId::Pfa)
        );
        assert_eq!(
            table.decide(&classified(IntentLabel::PfaCasCass, 0.99)),
            RoutingDecision::Clarify
        );
    }
}
