// src/registrar.rs
//
// Fronteira com o banco registrador. O orquestrador e a conciliação só
// conhecem o trait `RegistrarClient`; a implementação HTTP (Santander) e a
// de simulação ficam nos submódulos.

pub mod error;
pub mod santander;
pub mod simulated;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::boleto::Boleto;

pub use error::RegistrarError;
pub use santander::SantanderClient;
pub use simulated::SimulatedRegistrar;

/// Artefatos devolvidos pelo banco quando o registro é aceito.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationReceipt {
    pub bar_code: Option<String>,
    pub digitable_line: Option<String>,
    pub qr_code_pix: Option<String>,
    pub qr_code_url: Option<String>,
    pub entry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Default,
    Duplicate,
    Bankslip,
    Settlement,
    Registry,
}

impl QueryType {
    pub const ALL: [QueryType; 5] = [
        QueryType::Default,
        QueryType::Duplicate,
        QueryType::Bankslip,
        QueryType::Settlement,
        QueryType::Registry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Default => "default",
            QueryType::Duplicate => "duplicate",
            QueryType::Bankslip => "bankslip",
            QueryType::Settlement => "settlement",
            QueryType::Registry => "registry",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QueryType::Default => "Pesquisa padrão, trazendo somente dados básicos do boleto",
            QueryType::Duplicate => "Pesquisa de dados para emissão de segunda via de boleto",
            QueryType::Bankslip => "Pesquisa para dados completos do boleto",
            QueryType::Settlement => "Pesquisa para informações de baixas/liquidações do boleto",
            QueryType::Registry => "Pesquisa de informações de cartório no boleto",
        }
    }

    /// Lista usada na mensagem de erro de tipo inválido.
    pub fn allowed_values() -> String {
        Self::ALL.iter().map(|q| q.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == normalized)
            .ok_or_else(Self::allowed_values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayerInfo {
    pub name: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInfo {
    pub settlement_type: Option<String>,
    pub settlement_date: Option<String>,
    pub settlement_value: Option<Decimal>,
    pub settlement_origin: Option<String>,
    pub bank_code: Option<String>,
    pub bank_branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryInfo {
    pub registry_date: Option<String>,
    pub registry_number: Option<String>,
    pub notary_office: Option<String>,
    pub registry_cost: Option<Decimal>,
}

/// Resultado normalizado de uma consulta de status no banco.
///
/// Uma consulta sem conteúdo devolve tudo `None` (exceto os metadados):
/// o banco não conhece o título.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub beneficiary_code: Option<String>,
    pub bank_number: Option<String>,
    pub client_number: Option<String>,
    pub nsu_code: Option<String>,
    pub nsu_date: Option<String>,

    #[schema(example = "LIQUIDADO")]
    pub status: Option<String>,
    pub status_description: Option<String>,
    pub due_date: Option<String>,
    pub issue_date: Option<String>,
    pub entry_date: Option<String>,
    pub settlement_date: Option<String>,

    pub nominal_value: Option<Decimal>,
    pub paid_value: Option<Decimal>,
    pub discount_value: Option<Decimal>,
    pub fine_value: Option<Decimal>,
    pub interest_value: Option<Decimal>,

    pub payer: Option<PayerInfo>,
    pub qr_code_pix: Option<String>,
    pub qr_code_url: Option<String>,
    pub bar_code: Option<String>,
    pub digitable_line: Option<String>,
    pub document_kind: Option<String>,
    pub messages: Vec<String>,
    pub settlements: Vec<SettlementInfo>,
    pub registry_info: Option<RegistryInfo>,

    pub consulted_at: Option<DateTime<Utc>>,
    pub query_type: Option<String>,
}

impl StatusResponse {
    /// Resposta vazia: o banco não retornou nenhum título.
    pub fn empty(query_type: &str) -> Self {
        Self {
            consulted_at: Some(Utc::now()),
            query_type: Some(query_type.to_string()),
            ..Default::default()
        }
    }

    pub fn is_found(&self) -> bool {
        self.status.is_some() || self.bank_number.is_some()
    }
}

/// Datas do banco chegam como `yyyy-MM-dd`, `dd/MM/yyyy` ou com horário.
pub fn parse_bank_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Descrição legível do status bruto do banco.
pub fn describe_bank_status(status: Option<&str>) -> String {
    let Some(status) = status.filter(|s| !s.trim().is_empty()) else {
        return "Status não informado".to_string();
    };
    match status.trim().to_uppercase().as_str() {
        "ATIVO" => "Boleto em aberto (vencido ou a vencer)".to_string(),
        "BAIXADO" => "Boleto baixado (pagamento via PIX ou baixa manual)".to_string(),
        "LIQUIDADO" => "Boleto liquidado (pagamento via linha digitável/código de barras)".to_string(),
        "LIQUIDADO PARCIALMENTE" | "LIQUIDADO PARCIAL" => "Boleto com pagamento parcial".to_string(),
        "CANCELADO" => "Boleto cancelado".to_string(),
        "REGISTRADO" => "Boleto registrado, aguardando pagamento".to_string(),
        _ => status.to_string(),
    }
}

#[async_trait]
pub trait RegistrarClient: Send + Sync {
    async fn register(&self, boleto: &Boleto) -> Result<RegistrationReceipt, RegistrarError>;

    async fn query_by_bank_number(
        &self,
        beneficiary_code: &str,
        bank_number: &str,
    ) -> Result<StatusResponse, RegistrarError>;

    async fn query_by_client_number(
        &self,
        beneficiary_code: &str,
        client_number: &str,
        due_date: NaiveDate,
        nominal_value: Decimal,
    ) -> Result<StatusResponse, RegistrarError>;

    async fn query_by_bill_id(
        &self,
        bill_id: &str,
        query_type: QueryType,
    ) -> Result<StatusResponse, RegistrarError>;

    async fn cancel(
        &self,
        covenant_code: &str,
        bank_number: &str,
        nsu_date: NaiveDate,
    ) -> Result<(), RegistrarError>;

    async fn fetch_pdf_link(
        &self,
        bank_number: &str,
        covenant_code: &str,
        payer_document_number: &str,
    ) -> Result<String, RegistrarError>;

    async fn download_pdf(&self, url: &str) -> Result<Vec<u8>, RegistrarError>;
}
