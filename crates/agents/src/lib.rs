mod handlers;

use std::sync::Arc;
use std::time::Instant;

use fisc_core::{
    IdentifierError, IntentClassification, InvalidInput, RoutingDecision, RoutingTable, RulesHandle,
};
use fisc_gateways::{EInvoicePortal, PaymentGateway, PaymentOrder, PaymentTicket, SpvPortal};
use fisc_observability::AppMetrics;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

pub use handlers::{
    DomainHandler, EInvoiceHandler, FiscalCertificateHandler, GeneralGuidanceHandler, HandlerReply,
    PfaHandler, PropertySaleHandler, RentalIncomeHandler, ReplyStatus, RoutedRequest,
};

/// Typed failure surface of the dispatch layer; none of the variants is
/// fatal.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid {field}: {source}")]
    Identifier {
        field: &'static str,
        #[source]
        source: IdentifierError,
    },
    #[error("invalid calculation input: {0}")]
    Calculation(#[from] InvalidInput),
    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
}

/// Service menu shown when the request cannot be routed.
#[derive(Debug, Clone, Serialize)]
pub struct ClarificationRequest {
    pub prompt: String,
    pub options: Vec<String>,
}

pub fn clarification_request() -> ClarificationRequest {
    ClarificationRequest {
        prompt: "Nu am inteles exact ce doriti sa faceti. Va rog sa alegeti unul dintre serviciile de mai jos.".to_string(),
        options: vec![
            "D212 / Contributii PFA - depunere declaratie unica, calcul CAS/CASS".to_string(),
            "Impozit vanzare proprietate - calcul impozit 1% sau 3%".to_string(),
            "Inregistrare contract inchiriere - inregistrare la ANAF".to_string(),
            "Certificat fiscal - obtinere certificat de atestare fiscala".to_string(),
            "E-Factura - emitere facturi electronice B2B/B2C".to_string(),
        ],
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ConciergeOutcome {
    Clarification(ClarificationRequest),
    Handled(HandlerReply),
}

impl ConciergeOutcome {
    pub fn is_clarification(&self) -> bool {
        matches!(self, Self::Clarification(_))
    }
}

/// The concierge orchestrator: routes one classification per call and
/// dispatches to the matching domain handler. Generic over the gateway
/// bundle so callers choose between mocks and live portal clients.
#[derive(Clone)]
pub struct TaxConcierge<G> {
    routing: RoutingTable,
    rules: RulesHandle,
    gateways: Arc<G>,
    metrics: Arc<AppMetrics>,
}

impl<G> TaxConcierge<G>
where
    G: SpvPortal + PaymentGateway + EInvoicePortal,
{
    pub fn new(
        routing: RoutingTable,
        rules: RulesHandle,
        gateways: Arc<G>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            routing,
            rules,
            gateways,
            metrics,
        }
    }

    pub fn rules(&self) -> &RulesHandle {
        &self.rules
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    #[instrument(skip(self, classification))]
    pub async fn handle_classification(
        &self,
        classification: IntentClassification,
    ) -> Result<ConciergeOutcome, HandlerError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let decision = self.routing.decide(&classification);
        let outcome = match decision {
            RoutingDecision::Clarify => {
                self.metrics.inc_clarification();
                ConciergeOutcome::Clarification(clarification_request())
            }
            RoutingDecision::Dispatch(handler_id) => {
                self.metrics.inc_dispatch();
                let handler = DomainHandler::for_id(handler_id);
                let request = RoutedRequest {
                    label: classification.label,
                    entities: &classification.entities,
                    rules: self.rules.current(),
                };

                match handler.handle(request, self.gateways.as_ref()).await {
                    Ok(reply) => {
                        if reply.calculation.is_some() {
                            self.metrics.inc_calculation();
                        }
                        if reply.submission.is_some() {
                            self.metrics.inc_submission();
                        }
                        ConciergeOutcome::Handled(reply)
                    }
                    Err(error) => {
                        if matches!(error, HandlerError::Identifier { .. }) {
                            self.metrics.inc_validation_failure();
                        }
                        self.metrics.observe_latency(started.elapsed());
                        return Err(error);
                    }
                }
            }
        };

        self.metrics.observe_latency(started.elapsed());
        info!(
            intent = classification.label.as_code(),
            confidence = classification.confidence,
            clarify = outcome.is_clarification(),
            "classification routed"
        );

        Ok(outcome)
    }

    /// Forwards a tax payment to the payment rail after checking the
    /// amount. Callers invoke this once a calculation told them what is
    /// owed.
    pub async fn initiate_payment(
        &self,
        amount: f64,
        payment_type: &str,
        reference: Option<String>,
    ) -> Result<PaymentTicket, HandlerError> {
        if !amount.is_finite() {
            return Err(HandlerError::Calculation(InvalidInput::NotNumeric("amount")));
        }
        if amount <= 0.0 {
            return Err(HandlerError::Calculation(InvalidInput::OutOfDomain {
                field: "amount",
                constraint: "must be a positive amount",
            }));
        }

        self.metrics.inc_request();
        let ticket = self
            .gateways
            .initiate_payment(PaymentOrder {
                amount,
                payment_type: payment_type.to_string(),
                reference,
            })
            .await?;
        self.metrics.inc_submission();
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisc_core::{ExtractedEntities, IntentLabel, RuleTable};
    use fisc_gateways::MockGateways;

    fn concierge() -> TaxConcierge<MockGateways> {
        TaxConcierge::new(
            RoutingTable::default(),
            RulesHandle::new(RuleTable::default()),
            Arc::new(MockGateways::new()),
            AppMetrics::shared(),
        )
    }

    #[tokio::test]
    async fn low_confidence_yields_the_clarification_menu() {
        let outcome = concierge()
            .handle_classification(IntentClassification::new(IntentLabel::PfaCasCass, 0.30))
            .await
            .expect("clarification is not an error");

        match outcome {
            ConciergeOutcome::Clarification(request) => {
                assert_eq!(request.options.len(), 5);
            }
            ConciergeOutcome::Handled(_) => panic!("expected clarification"),
        }
    }

    #[tokio::test]
    async fn confident_classification_reaches_its_handler() {
        let classification = IntentClassification::new(IntentLabel::PfaCasCass, 0.91)
            .with_entities(ExtractedEntities {
                annual_income: Some(39_600.0),
                ..ExtractedEntities::default()
            });

        let outcome = concierge()
            .handle_classification(classification)
            .await
            .expect("dispatch should succeed");

        match outcome {
            ConciergeOutcome::Handled(reply) => {
                let calculation = reply.calculation.expect("calculation should run");
                assert_eq!(calculation.output("cas_amount"), Some(9_900.0));
            }
            ConciergeOutcome::Clarification(_) => panic!("expected dispatch"),
        }
    }

    #[tokio::test]
    async fn payment_rejects_non_positive_amounts() {
        let error = concierge()
            .initiate_payment(0.0, "impozit_vanzare", None)
            .await
            .expect_err("zero amount must be rejected");

        assert!(matches!(error, HandlerError::Calculation(_)));
    }

    #[tokio::test]
    async fn payment_returns_a_ticket_for_valid_amounts() {
        let ticket = concierge()
            .initiate_payment(1_000.0, "impozit_vanzare", Some("D212-2024-TEST".to_string()))
            .await
            .expect("payment should be initiated");

        assert!(ticket.transaction_id.starts_with("GH-"));
    }
}
