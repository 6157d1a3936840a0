// src/models/dashboard.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::{boleto::BoletoStatus, contrato::TipoPessoa};

// Linha agregada por status (GROUP BY status)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StatusTotal {
    pub status: BoletoStatus,
    pub quantidade: i64,
    pub valor_total: Decimal,
}

// Boleto liquidado, com as datas necessárias para achar o dia da liquidação
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LiquidacaoRow {
    pub nominal_value: Decimal,
    pub settlement_date: Option<NaiveDate>,
    pub data_atualizacao: Option<DateTime<Utc>>,
}

// 1. Cards do topo
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_boletos: i64,
    pub pendentes: i64,
    pub registrados: i64,
    pub liquidados: i64,
    pub vencidos: i64,
    pub cancelados: i64,
    pub com_erro: i64,
    #[schema(example = "15000.00")]
    pub valor_total_registrado: Decimal,
    #[schema(example = "4200.50")]
    pub valor_total_liquidado: Decimal,
    pub boletos_hoje: i64,
    pub boletos_este_mes: i64,
}

// 2. Gráfico de liquidações (um ponto por dia)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiquidacaoDia {
    #[schema(example = "14/10")]
    pub data: String,
    #[schema(example = "Ter")]
    pub dia_semana: String,
    pub valor: Decimal,
    pub quantidade: i64,
    #[schema(example = "2026-10-14")]
    pub data_completa: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiquidadosPorPeriodo {
    #[schema(example = "semana")]
    pub periodo: String,
    #[schema(example = "10/10/2026")]
    pub data_inicio: String,
    #[schema(example = "16/10/2026")]
    pub data_fim: String,
    pub total_dias: i64,
    pub valor_total: Decimal,
    pub quantidade_total: i64,
    pub dados: Vec<LiquidacaoDia>,
}

// 3. Mapa de faturamento por cliente

// Boleto de contrato ativo com o cliente dono do contrato
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FaturamentoRow {
    pub cliente_id: i64,
    pub tipo_pessoa: TipoPessoa,
    pub cliente_nome: Option<String>,
    pub cliente_documento: Option<String>,
    pub boleto_id: i64,
    pub contrato_id: i64,
    pub nsu_code: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub settlement_date: Option<NaiveDate>,
    pub nominal_value: Decimal,
    pub status: BoletoStatus,
    pub payer_name: String,
    pub payer_document_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoletoMapa {
    pub id: i64,
    pub contrato_id: i64,
    #[schema(example = "Contrato #7")]
    pub numero_contrato: String,
    pub nsu_code: String,
    #[schema(example = "01/10/2026")]
    pub data_emissao: String,
    #[schema(example = "16/11/2026")]
    pub data_vencimento: String,
    // Só nos pagos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_pagamento: Option<String>,
    pub valor: Decimal,
    pub status: BoletoStatus,
    pub vencido: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapaCliente {
    pub cliente_id: i64,
    pub nome: String,
    pub documento: String,
    pub tipo_pessoa: TipoPessoa,
    pub total_boletos: i64,
    pub total_pagos: i64,
    pub total_a_pagar: i64,
    pub valor_total_pago: Decimal,
    pub valor_total_a_pagar: Decimal,
    pub boletos_pagos: Vec<BoletoMapa>,
    pub boletos_a_pagar: Vec<BoletoMapa>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodo {
    Dia,
    Semana,
    Mes,
}

impl Periodo {
    /// Aceita `dia`, `semana`, `mes`/`mês`; qualquer outro valor vira `semana`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("dia") => Periodo::Dia,
            Some("mes") | Some("mês") => Periodo::Mes,
            _ => Periodo::Semana,
        }
    }

    pub fn dias(&self) -> i64 {
        match self {
            Periodo::Dia => 1,
            Periodo::Semana => 7,
            Periodo::Mes => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Periodo::Dia => "dia",
            Periodo::Semana => "semana",
            Periodo::Mes => "mes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_period_defaults_to_week() {
        assert_eq!(Periodo::parse(Some("trimestre")), Periodo::Semana);
        assert_eq!(Periodo::parse(None), Periodo::Semana);
        assert_eq!(Periodo::parse(Some("MÊS")), Periodo::Mes);
        assert_eq!(Periodo::parse(Some(" dia ")).dias(), 1);
    }
}
