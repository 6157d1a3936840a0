// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    common::error::AppError,
    models::{
        auth::Caller,
        boleto::{Boleto, BoletoEvento, BoletoStatus, NovoBoleto, NovoEvento},
        contrato::ContratoPagador,
        dashboard::{FaturamentoRow, LiquidacaoRow, StatusTotal},
    },
};

/// Persistência de boletos. Os serviços só dependem deste trait; a
/// implementação de produção é o `BoletoRepository` (Postgres).
#[async_trait]
pub trait BoletoStore: Send + Sync {
    /// Contrato com o cliente e os dados de pessoa/endereço do pagador.
    async fn find_contrato_pagador(&self, contrato_id: i64) -> Result<Option<ContratoPagador>, AppError>;

    /// Último "seu número" emitido (ordem de criação).
    async fn last_client_number(&self) -> Result<Option<String>, AppError>;

    /// Grava a intenção (status PENDENTE) e o evento CRIACAO numa transação.
    /// Colisão de NSU/nosso número vira `AppError::DuplicateIdentifier`.
    async fn insert_intent(&self, novo: &NovoBoleto, caller: &Caller) -> Result<Boleto, AppError>;

    /// Atualiza somente os campos mutáveis e grava o evento de auditoria
    /// na mesma transação, desde que o status gravado ainda seja `esperado`.
    ///
    /// Se outra operação mudou o status nesse meio tempo nada é gravado e a
    /// linha atual é devolvida; o chamador compara o status para saber.
    async fn save(&self, boleto: &Boleto, esperado: BoletoStatus, evento: NovoEvento) -> Result<Boleto, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Boleto>, AppError>;

    async fn list_active(&self) -> Result<Vec<Boleto>, AppError>;

    async fn list_by_contrato(&self, contrato_id: i64) -> Result<Vec<Boleto>, AppError>;

    /// Ativos em REGISTRADO ou ATIVO (candidatos à sincronização em lote).
    async fn list_syncable(&self) -> Result<Vec<Boleto>, AppError>;

    /// PENDENTE criados antes de `older_than` (criação interrompida).
    async fn list_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Boleto>, AppError>;

    async fn list_events(&self, boleto_id: i64) -> Result<Vec<BoletoEvento>, AppError>;

    // --- Leituras do dashboard ---

    async fn status_totals(&self) -> Result<Vec<StatusTotal>, AppError>;

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64, AppError>;

    /// Liquidados cuja data de liquidação (ou de atualização) pode cair a
    /// partir de `desde`; o filtro exato por dia fica no agregador.
    async fn liquidados_desde(&self, desde: NaiveDate) -> Result<Vec<LiquidacaoRow>, AppError>;

    /// Boletos de contratos ativos de clientes ativos, com os dados do
    /// cliente, ordenados por cliente e vencimento.
    async fn faturamento_por_cliente(&self) -> Result<Vec<FaturamentoRow>, AppError>;
}
