pub mod boleto_service;
pub mod dashboard_service;
pub mod identifiers;
pub mod reconciliation;
pub mod sanitizer;
