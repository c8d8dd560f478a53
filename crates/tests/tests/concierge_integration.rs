use std::sync::Arc;

use fisc_agents::{ConciergeOutcome, HandlerError, ReplyStatus, TaxConcierge};
use fisc_core::{
    ExtractedEntities, HandlerId, IntentClassification, IntentLabel, RoutingTable, RuleTable,
    RulesHandle,
};
use fisc_gateways::MockGateways;
use fisc_observability::AppMetrics;

fn concierge_with_metrics() -> (TaxConcierge<MockGateways>, Arc<AppMetrics>) {
    let metrics = AppMetrics::shared();
    let concierge = TaxConcierge::new(
        RoutingTable::default(),
        RulesHandle::new(RuleTable::default()),
        Arc::new(MockGateways::new()),
        metrics.clone(),
    );
    (concierge, metrics)
}

fn classified(label: IntentLabel, confidence: f64, entities: ExtractedEntities) -> IntentClassification {
    IntentClassification::new(label, confidence).with_entities(entities)
}

#[tokio::test]
async fn pfa_classification_flows_to_a_contribution_calculation() {
    let (concierge, metrics) = concierge_with_metrics();

    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::PfaCasCass,
            0.93,
            ExtractedEntities {
                annual_income: Some(39_600.0),
                ..ExtractedEntities::default()
            },
        ))
        .await
        .expect("dispatch should succeed");

    let ConciergeOutcome::Handled(reply) = outcome else {
        panic!("expected a handled reply");
    };
    assert_eq!(reply.handler, HandlerId::Pfa);
    assert_eq!(reply.status, ReplyStatus::Completed);

    let calculation = reply.calculation.expect("calculation should be present");
    assert_eq!(calculation.output("cas_amount"), Some(9_900.0));
    assert_eq!(calculation.output("cass_amount"), Some(1_980.0));
    assert_eq!(calculation.basis.rules_version, "2024.1");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.dispatches_total, 1);
    assert_eq!(snapshot.calculations_total, 1);
}

#[tokio::test]
async fn low_confidence_request_receives_the_service_menu() {
    let (concierge, metrics) = concierge_with_metrics();

    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::PropertySaleTax,
            0.40,
            ExtractedEntities::default(),
        ))
        .await
        .expect("clarification is a normal outcome");

    assert!(outcome.is_clarification());
    assert_eq!(metrics.snapshot().clarifications_total, 1);
}

#[tokio::test]
async fn d212_filing_submits_through_the_portal_stub() {
    let (concierge, metrics) = concierge_with_metrics();

    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::PfaD212Filing,
            0.88,
            ExtractedEntities {
                annual_income: Some(150_000.0),
                taxpayer_id: Some("1850101123451".to_string()),
                ..ExtractedEntities::default()
            },
        ))
        .await
        .expect("filing should succeed");

    let ConciergeOutcome::Handled(reply) = outcome else {
        panic!("expected a handled reply");
    };
    let submission = reply.submission.expect("receipt should be present");
    assert!(submission.reference.starts_with("D212-2024-"));
    assert_eq!(metrics.snapshot().submissions_total, 1);
}

#[tokio::test]
async fn invalid_seller_id_is_a_typed_validation_failure() {
    let (concierge, metrics) = concierge_with_metrics();

    let error = concierge
        .handle_classification(classified(
            IntentLabel::EfacturaB2b,
            0.95,
            ExtractedEntities {
                seller_id: Some("14399841".to_string()),
                ..ExtractedEntities::default()
            },
        ))
        .await
        .expect_err("bad checksum must surface as a typed failure");

    assert!(matches!(error, HandlerError::Identifier { field: "seller_id", .. }));
    assert_eq!(metrics.snapshot().validation_failures_total, 1);
}

#[tokio::test]
async fn rule_reload_does_not_disturb_pinned_snapshots() {
    let rules = RulesHandle::new(RuleTable::default());
    let pinned = rules.current();

    let concierge = TaxConcierge::new(
        RoutingTable::default(),
        rules.clone(),
        Arc::new(MockGateways::new()),
        AppMetrics::shared(),
    );

    let mut updated = RuleTable::default();
    updated.version = "2025.1".to_string();
    updated.minimum_gross_salary = 4_050.0;
    rules.reload(updated);

    // The snapshot taken before the reload still carries the old law.
    assert_eq!(pinned.version, "2024.1");
    assert_eq!(pinned.minimum_gross_salary, 3_300.0);

    // New requests compute under the reloaded table.
    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::PfaCasCass,
            0.90,
            ExtractedEntities {
                annual_income: Some(48_600.0),
                ..ExtractedEntities::default()
            },
        ))
        .await
        .expect("dispatch should succeed");

    let ConciergeOutcome::Handled(reply) = outcome else {
        panic!("expected a handled reply");
    };
    let calculation = reply.calculation.expect("calculation should be present");
    assert_eq!(calculation.basis.rules_version, "2025.1");
    assert_eq!(calculation.output("cas_amount"), Some(12_150.0));
}

#[tokio::test]
async fn replacement_routing_table_redirects_without_code_changes() {
    let raw = r#"{
        "confidence_threshold": 0.70,
        "routes": { "general_question": "rental_income" }
    }"#;
    let routing = RoutingTable::from_json_str(raw).expect("routing table should parse");

    let concierge = TaxConcierge::new(
        routing,
        RulesHandle::new(RuleTable::default()),
        Arc::new(MockGateways::new()),
        AppMetrics::shared(),
    );

    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::GeneralQuestion,
            0.80,
            ExtractedEntities {
                monthly_rent: Some(500.0),
                ..ExtractedEntities::default()
            },
        ))
        .await
        .expect("dispatch should succeed");

    let ConciergeOutcome::Handled(reply) = outcome else {
        panic!("expected a handled reply");
    };
    assert_eq!(reply.handler, HandlerId::RentalIncome);
}

#[tokio::test]
async fn outcomes_serialize_with_a_tagged_shape_for_the_renderer() {
    let (concierge, _metrics) = concierge_with_metrics();

    let outcome = concierge
        .handle_classification(classified(
            IntentLabel::Unclear,
            0.99,
            ExtractedEntities::default(),
        ))
        .await
        .expect("unclear label clarifies");

    let payload = serde_json::to_value(&outcome).expect("outcome should serialize");
    assert_eq!(payload["outcome"], "clarification");
    assert!(payload["options"].is_array());
}
