//! Narrow contracts for the external government and payment systems (ANAF
//! SPV, Ghiseul.ro, RO e-Factura) plus their mock implementations. Handlers
//! only ever see the traits.

use anyhow::Result;
use chrono::{DateTime, Utc};
use fisc_core::{FiscalId, PersonalId, TaxpayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A D212 declaration prepared for submission; the filer id has already
/// passed CNP validation.
#[derive(Debug, Clone, Serialize)]
pub struct DeclarationDraft {
    pub fiscal_year: i32,
    pub filer: PersonalId,
    pub annual_income: f64,
    pub cas_amount: f64,
    pub cass_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RentalContractDraft {
    pub landlord: PersonalId,
    pub monthly_rent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    pub amount: f64,
    pub payment_type: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceChannel {
    B2b,
    B2c,
}

impl InvoiceChannel {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::B2b => "b2b",
            Self::B2c => "b2c",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDraft {
    pub seller: FiscalId,
    pub channel: InvoiceChannel,
}

/// Receipt for a submission accepted by the SPV portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub reference: String,
    pub submitted_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateIssue {
    pub certificate_id: String,
    pub taxpayer_kind: String,
    pub download_url: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTicket {
    pub transaction_id: String,
    pub redirect_url: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceUpload {
    pub upload_index: String,
    pub channel: InvoiceChannel,
    pub state_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceState {
    pub upload_index: String,
    pub state: String,
    pub download_id: Option<String>,
}

/// ANAF SPV portal: declarations, contract registrations, certificates.
pub trait SpvPortal: Send + Sync {
    async fn submit_declaration(&self, draft: DeclarationDraft) -> Result<SubmissionReceipt>;
    async fn register_rental_contract(
        &self,
        draft: RentalContractDraft,
    ) -> Result<SubmissionReceipt>;
    async fn request_fiscal_certificate(
        &self,
        taxpayer: &TaxpayerId,
        certificate_type: &str,
    ) -> Result<CertificateIssue>;
}

/// Ghiseul.ro payment rail.
pub trait PaymentGateway: Send + Sync {
    async fn initiate_payment(&self, order: PaymentOrder) -> Result<PaymentTicket>;
}

/// RO e-Factura portal.
pub trait EInvoicePortal: Send + Sync {
    async fn submit_invoice(&self, draft: InvoiceDraft) -> Result<InvoiceUpload>;
    async fn invoice_status(&self, upload_index: &str) -> Result<InvoiceState>;
}

/// Always-successful stand-in for every portal, with uuid-tagged receipts.
#[derive(Debug, Clone, Default)]
pub struct MockGateways;

impl MockGateways {
    pub fn new() -> Self {
        Self
    }
}

impl SpvPortal for MockGateways {
    async fn submit_declaration(&self, draft: DeclarationDraft) -> Result<SubmissionReceipt> {
        Ok(SubmissionReceipt {
            reference: format!(
                "D212-{}-{}",
                draft.fiscal_year,
                short_reference()
            ),
            submitted_at: Utc::now(),
            message: "Declaratia D212 a fost depusa cu succes".to_string(),
        })
    }

    async fn register_rental_contract(
        &self,
        _draft: RentalContractDraft,
    ) -> Result<SubmissionReceipt> {
        Ok(SubmissionReceipt {
            reference: format!("CONTR-{}", short_reference()),
            submitted_at: Utc::now(),
            message: "Contractul de inchiriere a fost inregistrat".to_string(),
        })
    }

    async fn request_fiscal_certificate(
        &self,
        taxpayer: &TaxpayerId,
        _certificate_type: &str,
    ) -> Result<CertificateIssue> {
        let certificate_id = format!("CERT-{}", short_reference());
        Ok(CertificateIssue {
            download_url: format!("mock://anaf.ro/certificates/{certificate_id}.pdf"),
            certificate_id,
            taxpayer_kind: taxpayer.kind().to_string(),
            issued_at: Utc::now(),
        })
    }
}

impl PaymentGateway for MockGateways {
    async fn initiate_payment(&self, order: PaymentOrder) -> Result<PaymentTicket> {
        Ok(PaymentTicket {
            transaction_id: format!("GH-{}", short_reference()),
            redirect_url: format!("mock://ghiseul.ro/payment/{}", short_reference()),
            message: format!("Plata de {:.2} RON a fost initiata", order.amount),
            created_at: Utc::now(),
        })
    }
}

impl EInvoicePortal for MockGateways {
    async fn submit_invoice(&self, draft: InvoiceDraft) -> Result<InvoiceUpload> {
        Ok(InvoiceUpload {
            upload_index: format!("EF-{}", short_reference()),
            channel: draft.channel,
            state_message: "Factura a fost transmisa spre validare".to_string(),
        })
    }

    async fn invoice_status(&self, upload_index: &str) -> Result<InvoiceState> {
        Ok(InvoiceState {
            upload_index: upload_index.to_string(),
            state: "ok".to_string(),
            download_id: Some(short_reference()),
        })
    }
}

fn short_reference() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisc_core::validate_personal_id;

    #[tokio::test]
    async fn mock_declaration_receipt_is_tagged_by_fiscal_year() {
        let filer = validate_personal_id("1850101123451").expect("valid CNP");
        let receipt = MockGateways::new()
            .submit_declaration(DeclarationDraft {
                fiscal_year: 2024,
                filer,
                annual_income: 150_000.0,
                cas_amount: 9_900.0,
                cass_amount: 1_980.0,
            })
            .await
            .expect("mock submission should succeed");

        assert!(receipt.reference.starts_with("D212-2024-"));
        assert!(!receipt.message.is_empty());
    }

    #[tokio::test]
    async fn mock_invoice_upload_keeps_the_channel() {
        let seller = fisc_core::validate_fiscal_id("RO14399840").expect("valid CUI");
        let upload = MockGateways::new()
            .submit_invoice(InvoiceDraft {
                seller,
                channel: InvoiceChannel::B2b,
            })
            .await
            .expect("mock upload should succeed");

        assert_eq!(upload.channel, InvoiceChannel::B2b);
        assert!(upload.upload_index.starts_with("EF-"));
    }
}
