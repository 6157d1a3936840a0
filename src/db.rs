pub mod boleto_repo;
pub use boleto_repo::BoletoRepository;
pub mod store;
pub use store::BoletoStore;
