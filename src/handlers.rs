pub mod boletos;
pub mod dashboard;
