use std::sync::Arc;

use chrono::Datelike;
use fisc_core::{
    calculate, validate_fiscal_id, validate_personal_id, validate_taxpayer_id, CalculationRequest,
    CalculationResult, ExtractedEntities, HandlerId, IntentLabel, RuleTable,
};
use fisc_gateways::{
    CertificateIssue, DeclarationDraft, EInvoicePortal, InvoiceChannel, InvoiceDraft,
    InvoiceUpload, PaymentGateway, RentalContractDraft, SpvPortal, SubmissionReceipt,
};
use serde::Serialize;

use crate::HandlerError;

/// One dispatched request: the winning label, the classifier entities, and
/// the rule snapshot pinned for this request.
#[derive(Debug, Clone)]
pub struct RoutedRequest<'a> {
    pub label: IntentLabel,
    pub entities: &'a ExtractedEntities,
    pub rules: Arc<RuleTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Completed,
    NeedsInput,
}

/// Plain immutable data returned by a handler; the external renderer turns
/// it into user-facing text.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerReply {
    pub handler: HandlerId,
    pub status: ReplyStatus,
    pub calculation: Option<CalculationResult>,
    pub submission: Option<SubmissionReceipt>,
    pub certificate: Option<CertificateIssue>,
    pub invoice: Option<InvoiceUpload>,
    pub missing: Vec<&'static str>,
    pub notes: Vec<String>,
}

impl HandlerReply {
    fn new(handler: HandlerId) -> Self {
        Self {
            handler,
            status: ReplyStatus::Completed,
            calculation: None,
            submission: None,
            certificate: None,
            invoice: None,
            missing: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// The handler dispatch contract: every variant accepts a routed request
/// and may invoke the calculation engine and/or an external system stub.
#[derive(Debug, Clone)]
pub enum DomainHandler {
    Pfa(PfaHandler),
    PropertySale(PropertySaleHandler),
    RentalIncome(RentalIncomeHandler),
    FiscalCertificate(FiscalCertificateHandler),
    EInvoice(EInvoiceHandler),
    GeneralGuidance(GeneralGuidanceHandler),
}

impl DomainHandler {
    pub fn for_id(id: HandlerId) -> Self {
        match id {
            HandlerId::Pfa => Self::Pfa(PfaHandler),
            HandlerId::PropertySale => Self::PropertySale(PropertySaleHandler),
            HandlerId::RentalIncome => Self::RentalIncome(RentalIncomeHandler),
            HandlerId::FiscalCertificate => Self::FiscalCertificate(FiscalCertificateHandler),
            HandlerId::EInvoice => Self::EInvoice(EInvoiceHandler),
            HandlerId::GeneralGuidance => Self::GeneralGuidance(GeneralGuidanceHandler),
        }
    }

    pub fn id(&self) -> HandlerId {
        match self {
            Self::Pfa(_) => HandlerId::Pfa,
            Self::PropertySale(_) => HandlerId::PropertySale,
            Self::RentalIncome(_) => HandlerId::RentalIncome,
            Self::FiscalCertificate(_) => HandlerId::FiscalCertificate,
            Self::EInvoice(_) => HandlerId::EInvoice,
            Self::GeneralGuidance(_) => HandlerId::GeneralGuidance,
        }
    }

    pub async fn handle<G>(
        &self,
        request: RoutedRequest<'_>,
        gateways: &G,
    ) -> Result<HandlerReply, HandlerError>
    where
        G: SpvPortal + PaymentGateway + EInvoicePortal,
    {
        match self {
            Self::Pfa(handler) => handler.handle(request, gateways).await,
            Self::PropertySale(handler) => handler.handle(request).await,
            Self::RentalIncome(handler) => handler.handle(request, gateways).await,
            Self::FiscalCertificate(handler) => handler.handle(request, gateways).await,
            Self::EInvoice(handler) => handler.handle(request, gateways).await,
            Self::GeneralGuidance(handler) => handler.handle(request).await,
        }
    }
}

/// CAS/CASS contribution calculation and D212 filing.
#[derive(Debug, Clone, Default)]
pub struct PfaHandler;

impl PfaHandler {
    pub async fn handle<G: SpvPortal>(
        &self,
        request: RoutedRequest<'_>,
        gateways: &G,
    ) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::Pfa);

        let Some(annual_income) = request.entities.annual_income else {
            reply.status = ReplyStatus::NeedsInput;
            reply.missing.push("annual_income");
            reply.notes.push(format!(
                "CAS threshold {:.2} RON, CASS threshold {:.2} RON under rule table {}",
                request.rules.cas_threshold(),
                request.rules.cass_threshold(),
                request.rules.version,
            ));
            return Ok(reply);
        };

        let calculation = calculate(
            &CalculationRequest::pfa_contributions(annual_income),
            &request.rules,
        )?;

        if request.label == IntentLabel::PfaD212Filing {
            match request.entities.taxpayer_id.as_deref() {
                Some(raw) => {
                    let filer = validate_personal_id(raw).map_err(|source| {
                        HandlerError::Identifier {
                            field: "taxpayer_id",
                            source,
                        }
                    })?;
                    let draft = DeclarationDraft {
                        fiscal_year: request.rules.valid_from.year(),
                        filer,
                        annual_income,
                        cas_amount: calculation.output("cas_amount").unwrap_or_default(),
                        cass_amount: calculation.output("cass_amount").unwrap_or_default(),
                    };
                    reply.submission = Some(gateways.submit_declaration(draft).await?);
                }
                None => {
                    reply.status = ReplyStatus::NeedsInput;
                    reply.missing.push("taxpayer_id");
                    reply
                        .notes
                        .push("declaration not submitted: filer CNP is required".to_string());
                }
            }
        }

        reply.calculation = Some(calculation);
        Ok(reply)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertySaleHandler;

impl PropertySaleHandler {
    pub async fn handle(&self, request: RoutedRequest<'_>) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::PropertySale);

        if request.entities.property_value.is_none() {
            reply.missing.push("property_value");
        }
        if request.entities.ownership_years.is_none() {
            reply.missing.push("ownership_years");
        }

        match (
            request.entities.property_value,
            request.entities.ownership_years,
        ) {
            (Some(sale_price), Some(ownership_years)) => {
                reply.calculation = Some(calculate(
                    &CalculationRequest::property_sale_tax(sale_price, ownership_years),
                    &request.rules,
                )?);
            }
            _ => reply.status = ReplyStatus::NeedsInput,
        }

        Ok(reply)
    }
}

/// Flat-rate tax on annualized rent, plus contract registration.
#[derive(Debug, Clone, Default)]
pub struct RentalIncomeHandler;

impl RentalIncomeHandler {
    pub async fn handle<G: SpvPortal>(
        &self,
        request: RoutedRequest<'_>,
        gateways: &G,
    ) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::RentalIncome);

        match request.entities.monthly_rent {
            Some(monthly_rent) => {
                let annual_rental_income = monthly_rent * 12.0;
                reply.calculation = Some(calculate(
                    &CalculationRequest::rental_income_tax(annual_rental_income),
                    &request.rules,
                )?);
                reply.notes.push(format!(
                    "annualized from a monthly rent of {monthly_rent:.2} RON"
                ));
            }
            None => {
                reply.status = ReplyStatus::NeedsInput;
                reply.missing.push("monthly_rent");
            }
        }

        if request.label == IntentLabel::RentalContractRegistration {
            match (
                request.entities.taxpayer_id.as_deref(),
                request.entities.monthly_rent,
            ) {
                (Some(raw), Some(monthly_rent)) => {
                    let landlord = validate_personal_id(raw).map_err(|source| {
                        HandlerError::Identifier {
                            field: "taxpayer_id",
                            source,
                        }
                    })?;
                    reply.submission = Some(
                        gateways
                            .register_rental_contract(RentalContractDraft {
                                landlord,
                                monthly_rent,
                            })
                            .await?,
                    );
                }
                (None, _) => {
                    reply.status = ReplyStatus::NeedsInput;
                    reply.missing.push("taxpayer_id");
                    reply
                        .notes
                        .push("contract not registered: landlord CNP is required".to_string());
                }
                _ => {}
            }
        }

        Ok(reply)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FiscalCertificateHandler;

impl FiscalCertificateHandler {
    pub async fn handle<G: SpvPortal>(
        &self,
        request: RoutedRequest<'_>,
        gateways: &G,
    ) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::FiscalCertificate);

        let Some(raw) = request.entities.taxpayer_id.as_deref() else {
            reply.status = ReplyStatus::NeedsInput;
            reply.missing.push("taxpayer_id");
            return Ok(reply);
        };

        let taxpayer = validate_taxpayer_id(raw).map_err(|source| HandlerError::Identifier {
            field: "taxpayer_id",
            source,
        })?;
        let certificate_type = request
            .entities
            .certificate_type
            .as_deref()
            .unwrap_or("atestare_fiscala");

        reply.certificate = Some(
            gateways
                .request_fiscal_certificate(&taxpayer, certificate_type)
                .await?,
        );
        Ok(reply)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EInvoiceHandler;

impl EInvoiceHandler {
    pub async fn handle<G: EInvoicePortal>(
        &self,
        request: RoutedRequest<'_>,
        gateways: &G,
    ) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::EInvoice);

        let Some(raw) = request.entities.seller_id.as_deref() else {
            reply.status = ReplyStatus::NeedsInput;
            reply.missing.push("seller_id");
            return Ok(reply);
        };

        let seller = validate_fiscal_id(raw).map_err(|source| HandlerError::Identifier {
            field: "seller_id",
            source,
        })?;
        let channel = match request.label {
            IntentLabel::EfacturaB2b => InvoiceChannel::B2b,
            IntentLabel::EfacturaB2c => InvoiceChannel::B2c,
            _ => match request.entities.invoice_type.as_deref() {
                Some(kind) if kind.eq_ignore_ascii_case("b2b") => InvoiceChannel::B2b,
                _ => InvoiceChannel::B2c,
            },
        };

        reply.invoice = Some(gateways.submit_invoice(InvoiceDraft { seller, channel }).await?);
        Ok(reply)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneralGuidanceHandler;

impl GeneralGuidanceHandler {
    pub async fn handle(&self, _request: RoutedRequest<'_>) -> Result<HandlerReply, HandlerError> {
        let mut reply = HandlerReply::new(HandlerId::GeneralGuidance);
        reply
            .notes
            .push("general tax question; answer text is rendered by the language layer".to_string());
        Ok(reply)
    }
}
