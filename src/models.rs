pub mod auth;
pub mod boleto;
pub mod contrato;
pub mod dashboard;
