// src/models/boleto.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "boleto_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BoletoStatus {
    Pendente,   // Intenção gravada, ainda não aceito pelo banco
    Registrado, // Aceito pelo banco
    Ativo,      // Sinônimo de registrado usado por registros antigos
    Erro,       // Banco recusou (ou falhou) o registro
    Vencido,
    Liquidado,
    Cancelado,
}

use BoletoStatus::*;

// Tabela de transições permitidas (origem, destino).
const TRANSICOES: &[(BoletoStatus, BoletoStatus)] = &[
    (Pendente, Registrado),
    (Pendente, Erro),
    (Pendente, Cancelado),
    (Registrado, Liquidado),
    (Registrado, Vencido),
    (Registrado, Cancelado),
    (Ativo, Liquidado),
    (Ativo, Vencido),
    (Ativo, Cancelado),
    (Vencido, Liquidado),
    (Vencido, Cancelado),
    (Erro, Registrado),
    (Erro, Erro),
    (Erro, Cancelado),
];

impl BoletoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pendente => "PENDENTE",
            Registrado => "REGISTRADO",
            Ativo => "ATIVO",
            Erro => "ERRO",
            Vencido => "VENCIDO",
            Liquidado => "LIQUIDADO",
            Cancelado => "CANCELADO",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Liquidado | Cancelado)
    }

    /// Estados em que o título existe no banco e pode ser baixado lá.
    pub fn is_live_at_bank(&self) -> bool {
        matches!(self, Registrado | Ativo | Vencido)
    }

    pub fn can_transition_to(&self, next: BoletoStatus) -> bool {
        TRANSICOES.iter().any(|&(from, to)| from == *self && to == next)
    }
}

impl fmt::Display for BoletoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "documento_tipo", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Cpf,
    Cnpj,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Cpf => "CPF",
            DocumentType::Cnpj => "CNPJ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "boleto_evento_tipo", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoEvento {
    Criacao,
    Registro,
    FalhaRegistro,
    Sincronizacao,
    Cancelamento,
    Recuperacao,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Boleto {
    #[schema(example = 42)]
    pub id: i64,

    #[schema(example = 7)]
    pub contrato_id: i64,

    // --- Identificação (imutável depois do INSERT) ---
    #[schema(example = "1718042538123")]
    pub nsu_code: String,
    pub nsu_date: NaiveDate,
    #[schema(example = "0596794")]
    pub covenant_code: String,
    #[schema(example = "1718042538417")]
    pub bank_number: String,
    #[schema(example = "CONT149")]
    pub client_number: String,

    // --- Dados financeiros ---
    pub due_date: NaiveDate,
    pub issue_date: NaiveDate,
    #[schema(example = "1500.00")]
    pub nominal_value: Decimal,
    #[schema(example = "DUPLICATA_MERCANTIL")]
    pub document_kind: String,
    pub fine_percentage: Option<Decimal>,
    pub fine_quantity_days: Option<i32>,
    pub interest_percentage: Option<Decimal>,
    pub deduction_value: Option<Decimal>,
    pub write_off_quantity_days: Option<i32>,
    pub messages: Option<Vec<String>>,

    // --- Pagador (snapshot higienizado) ---
    #[schema(example = "Joao D Avila E Cia")]
    pub payer_name: String,
    pub payer_document_type: DocumentType,
    #[schema(example = "12345678000199")]
    pub payer_document_number: String,
    pub payer_address: String,
    pub payer_neighborhood: String,
    pub payer_city: String,
    #[schema(example = "SP")]
    pub payer_state: String,
    #[schema(example = "01310-100")]
    pub payer_zip_code: String,

    // --- Ciclo de vida ---
    pub status: BoletoStatus,
    pub bar_code: Option<String>,
    pub digitable_line: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub qr_code_pix: Option<String>,
    pub qr_code_url: Option<String>,
    pub paid_value: Option<Decimal>,
    pub settlement_date: Option<NaiveDate>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub trace_id: Option<String>,

    pub ativo: bool,
    pub data_cadastro: DateTime<Utc>,
    pub data_atualizacao: Option<DateTime<Utc>>,
    pub criado_por: Option<i64>,
    pub atualizado_por: Option<i64>,
}

impl Boleto {
    /// Limpa os campos de falha de registro (usado no reenvio).
    pub fn clear_error(&mut self) {
        self.error_code = None;
        self.error_message = None;
        self.trace_id = None;
    }
}

/// Snapshot do pagador já higienizado, pronto para gravação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerSnapshot {
    pub name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// Dados de emissão já validados pela camada HTTP.
#[derive(Debug, Clone, Default)]
pub struct DadosEmissao {
    pub contrato_id: i64,
    pub due_date: NaiveDate,
    pub issue_date: Option<NaiveDate>,
    pub nominal_value: Decimal,
    pub client_number: Option<String>,
    pub fine_percentage: Option<Decimal>,
    pub fine_quantity_days: Option<i32>,
    pub interest_percentage: Option<Decimal>,
    pub deduction_value: Option<Decimal>,
    pub write_off_quantity_days: Option<i32>,
    pub messages: Option<Vec<String>>,
}

/// Linha de intenção: tudo que é gravado antes de qualquer chamada ao banco.
#[derive(Debug, Clone)]
pub struct NovoBoleto {
    pub contrato_id: i64,
    pub nsu_code: String,
    pub nsu_date: NaiveDate,
    pub covenant_code: String,
    pub bank_number: String,
    pub client_number: String,
    pub due_date: NaiveDate,
    pub issue_date: NaiveDate,
    pub nominal_value: Decimal,
    pub document_kind: String,
    pub fine_percentage: Option<Decimal>,
    pub fine_quantity_days: Option<i32>,
    pub interest_percentage: Option<Decimal>,
    pub deduction_value: Option<Decimal>,
    pub write_off_quantity_days: Option<i32>,
    pub messages: Option<Vec<String>>,
    pub payer: PayerSnapshot,
}

/// Entrada da trilha de auditoria (`boleto_eventos`).
#[derive(Debug, Clone, PartialEq)]
pub struct NovoEvento {
    pub tipo: TipoEvento,
    pub status_anterior: Option<BoletoStatus>,
    pub status_novo: BoletoStatus,
    pub usuario_id: Option<i64>,
    pub detalhe: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoletoEvento {
    pub id: i64,
    pub boleto_id: i64,
    pub tipo: TipoEvento,
    pub status_anterior: Option<BoletoStatus>,
    pub status_novo: BoletoStatus,
    pub usuario_id: Option<i64>,
    pub detalhe: Option<String>,
    pub criado_em: DateTime<Utc>,
}

// --- Resultado da sincronização em lote ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub boleto_id: i64,
    pub nsu_code: String,
    pub status_anterior: BoletoStatus,
    pub status_novo: BoletoStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub boleto_id: i64,
    pub nsu_code: String,
    pub erro: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncReport {
    pub total: usize,
    pub sucesso: usize,
    pub erros: usize,
    pub atualizados: Vec<StatusChange>,
    pub erros_lista: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub analisados: usize,
    pub registrados: usize,
    pub marcados_erro: usize,
    pub adiados: usize,
}
