use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static CNP_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{13}$").expect("valid CNP format regex"));
static CUI_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2,10}$").expect("valid CUI format regex"));

// Weighted-checksum control keys mandated for the two identifier kinds.
const CNP_CONTROL_KEY: [u32; 12] = [2, 7, 9, 1, 4, 6, 3, 5, 8, 2, 7, 9];
const CUI_CONTROL_KEY: [u32; 9] = [7, 5, 3, 2, 1, 7, 5, 3, 2];

/// Typed validation failure. Format failures are reported before any
/// checksum arithmetic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier does not match the expected format")]
    InvalidFormat,
    #[error("identifier check digit does not match the computed checksum")]
    InvalidChecksum,
}

/// A CNP that passed format and checksum validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalId(String);

impl PersonalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A CUI that passed validation, held in canonical form (digits only, any
/// `RO` VAT prefix stripped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalId(String);

impl FiscalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Either identifier kind, selected by shape. Used where callers accept a
/// CNP or a CUI interchangeably (certificate requests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerId {
    Personal(PersonalId),
    Fiscal(FiscalId),
}

impl TaxpayerId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Personal(id) => id.as_str(),
            Self::Fiscal(id) => id.as_str(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Personal(_) => "personal",
            Self::Fiscal(_) => "fiscal",
        }
    }
}

/// Validates a CNP (Cod Numeric Personal): 13 digits, the last being a
/// weighted checksum of the first 12 modulo 11, with remainder 10 mapping
/// to check digit 1.
pub fn validate_personal_id(raw: &str) -> Result<PersonalId, IdentifierError> {
    let candidate = raw.trim();
    if !CNP_FORMAT.is_match(candidate) {
        return Err(IdentifierError::InvalidFormat);
    }

    let digits: Vec<u32> = candidate
        .bytes()
        .map(|byte| u32::from(byte - b'0'))
        .collect();

    let weighted_sum: u32 = digits
        .iter()
        .zip(CNP_CONTROL_KEY)
        .map(|(digit, weight)| digit * weight)
        .sum();
    let remainder = weighted_sum % 11;
    let expected = if remainder < 10 { remainder } else { 1 };

    if digits[12] == expected {
        Ok(PersonalId(candidate.to_string()))
    } else {
        Err(IdentifierError::InvalidChecksum)
    }
}

/// Validates a CUI (Cod Unic de Identificare): 2-10 digits with an optional
/// `RO` VAT prefix. The checksum pads to 10 digits, weights the first nine,
/// and takes `(sum * 10) % 11`, with result 10 mapping to check digit 0.
pub fn validate_fiscal_id(raw: &str) -> Result<FiscalId, IdentifierError> {
    let candidate = raw.trim().to_ascii_uppercase();
    let digits_part = candidate.strip_prefix("RO").unwrap_or(&candidate).trim();

    if !CUI_FORMAT.is_match(digits_part) {
        return Err(IdentifierError::InvalidFormat);
    }

    let padded = format!("{digits_part:0>10}");
    let digits: Vec<u32> = padded.bytes().map(|byte| u32::from(byte - b'0')).collect();

    let weighted_sum: u32 = digits
        .iter()
        .zip(CUI_CONTROL_KEY)
        .map(|(digit, weight)| digit * weight)
        .sum();
    let control = (weighted_sum * 10) % 11;
    let expected = if control < 10 { control } else { 0 };

    if digits[9] == expected {
        Ok(FiscalId(digits_part.to_string()))
    } else {
        Err(IdentifierError::InvalidChecksum)
    }
}

/// Validates a string that may be either identifier kind: 13 digits are
/// treated as a CNP, everything else as a CUI.
pub fn validate_taxpayer_id(raw: &str) -> Result<TaxpayerId, IdentifierError> {
    let candidate = raw.trim();
    if candidate.len() == 13 && candidate.bytes().all(|byte| byte.is_ascii_digit()) {
        validate_personal_id(candidate).map(TaxpayerId::Personal)
    } else {
        validate_fiscal_id(candidate).map(TaxpayerId::Fiscal)
    }
}
