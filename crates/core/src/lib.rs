pub mod calc;
pub mod models;
pub mod routing;
pub mod rules;
pub mod validators;

pub use calc::{calculate, InvalidInput};
pub use models::*;
pub use routing::RoutingTable;
pub use rules::{RuleTable, RulesError, RulesHandle};
pub use validators::{
    validate_fiscal_id, validate_personal_id, validate_taxpayer_id, FiscalId, IdentifierError,
    PersonalId, TaxpayerId,
};
