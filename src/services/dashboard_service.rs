// src/services/dashboard_service.rs

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::BoletoStore,
    models::{
        boleto::BoletoStatus,
        dashboard::{
            BoletoMapa, DashboardSummary, FaturamentoRow, LiquidacaoDia, LiquidacaoRow,
            LiquidadosPorPeriodo, MapaCliente, Periodo,
        },
    },
};

const DIAS_SEMANA: [&str; 7] = ["Dom", "Seg", "Ter", "Qua", "Qui", "Sex", "Sáb"];

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn BoletoStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn BoletoStore>) -> Self {
        Self { store }
    }

    pub async fn summary(&self) -> Result<DashboardSummary, AppError> {
        let hoje = Local::now().date_naive();
        let inicio_mes = hoje.with_day(1).unwrap_or(hoje);

        let totais = self.store.status_totals().await?;
        let boletos_hoje = self.store.count_created_since(inicio_local(hoje)).await?;
        let boletos_este_mes = self.store.count_created_since(inicio_local(inicio_mes)).await?;

        let mut summary = DashboardSummary {
            boletos_hoje,
            boletos_este_mes,
            ..Default::default()
        };

        for total in totais {
            summary.total_boletos += total.quantidade;
            match total.status {
                BoletoStatus::Pendente => summary.pendentes += total.quantidade,
                BoletoStatus::Registrado | BoletoStatus::Ativo => {
                    summary.registrados += total.quantidade;
                    summary.valor_total_registrado += total.valor_total;
                }
                BoletoStatus::Liquidado => {
                    summary.liquidados += total.quantidade;
                    summary.valor_total_liquidado += total.valor_total;
                }
                BoletoStatus::Vencido => summary.vencidos += total.quantidade,
                BoletoStatus::Cancelado => summary.cancelados += total.quantidade,
                BoletoStatus::Erro => summary.com_erro += total.quantidade,
            }
        }

        Ok(summary)
    }

    pub async fn liquidados_por_periodo(&self, periodo: Option<&str>) -> Result<LiquidadosPorPeriodo, AppError> {
        let periodo = Periodo::parse(periodo);
        let hoje = Local::now().date_naive();
        let inicio = hoje - Duration::days(periodo.dias() - 1);

        let rows = self.store.liquidados_desde(inicio).await?;
        tracing::debug!(periodo = periodo.as_str(), linhas = rows.len(), "Montando série de liquidações");

        Ok(build_series(periodo, hoje, &rows))
    }

    pub async fn mapas_faturamento(&self) -> Result<Vec<MapaCliente>, AppError> {
        let rows = self.store.faturamento_por_cliente().await?;
        let mapas = build_billing_maps(&rows, Local::now().date_naive());
        tracing::info!(
            clientes = mapas.len(),
            boletos = rows.len(),
            "🗺️ Mapas de faturamento montados"
        );
        Ok(mapas)
    }
}

/// Agrupa por cliente: pagos (LIQUIDADO) e a pagar (nem liquidados nem
/// cancelados). Cancelados entram só no total de boletos.
pub fn build_billing_maps(rows: &[FaturamentoRow], hoje: NaiveDate) -> Vec<MapaCliente> {
    let mut por_cliente: Vec<(i64, Vec<&FaturamentoRow>)> = Vec::new();
    for row in rows {
        match por_cliente.iter_mut().find(|(id, _)| *id == row.cliente_id) {
            Some((_, boletos)) => boletos.push(row),
            None => por_cliente.push((row.cliente_id, vec![row])),
        }
    }

    let mut mapas: Vec<MapaCliente> = por_cliente
        .into_iter()
        .map(|(cliente_id, mut boletos)| {
            boletos.sort_by_key(|b| (b.due_date, b.boleto_id));
            let primeiro = boletos[0];

            // Nome e documento do boleto (snapshot enviado ao banco) antes do cadastro
            let nome = non_empty(&primeiro.payer_name)
                .or(primeiro.cliente_nome.as_deref())
                .unwrap_or("Cliente sem nome")
                .to_string();
            let documento = non_empty(&primeiro.payer_document_number)
                .or(primeiro.cliente_documento.as_deref())
                .unwrap_or("Sem documento")
                .to_string();

            let mut pagos: Vec<&FaturamentoRow> =
                boletos.iter().copied().filter(|b| b.status == BoletoStatus::Liquidado).collect();
            pagos.sort_by(|a, b| b.settlement_date.cmp(&a.settlement_date));
            let a_pagar: Vec<&FaturamentoRow> = boletos
                .iter()
                .copied()
                .filter(|b| !b.status.is_terminal())
                .collect();

            MapaCliente {
                cliente_id,
                nome,
                documento,
                tipo_pessoa: primeiro.tipo_pessoa,
                total_boletos: boletos.len() as i64,
                total_pagos: pagos.len() as i64,
                total_a_pagar: a_pagar.len() as i64,
                valor_total_pago: pagos.iter().map(|b| b.nominal_value).sum(),
                valor_total_a_pagar: a_pagar.iter().map(|b| b.nominal_value).sum(),
                boletos_pagos: pagos.into_iter().map(|b| boleto_mapa(b, hoje)).collect(),
                boletos_a_pagar: a_pagar.into_iter().map(|b| boleto_mapa(b, hoje)).collect(),
            }
        })
        .collect();

    mapas.sort_by(|a, b| a.nome.to_lowercase().cmp(&b.nome.to_lowercase()));
    mapas
}

fn boleto_mapa(row: &FaturamentoRow, hoje: NaiveDate) -> BoletoMapa {
    let pago = row.status == BoletoStatus::Liquidado;
    BoletoMapa {
        id: row.boleto_id,
        contrato_id: row.contrato_id,
        numero_contrato: format!("Contrato #{}", row.contrato_id),
        nsu_code: row.nsu_code.clone(),
        data_emissao: row.issue_date.format("%d/%m/%Y").to_string(),
        data_vencimento: row.due_date.format("%d/%m/%Y").to_string(),
        data_pagamento: if pago {
            row.settlement_date.map(|d| d.format("%d/%m/%Y").to_string())
        } else {
            None
        },
        valor: row.nominal_value,
        status: row.status,
        vencido: !pago && row.due_date < hoje,
    }
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
}

/// Meia-noite local do dia, em UTC.
fn inicio_local(dia: NaiveDate) -> DateTime<Utc> {
    let meia_noite = dia.and_time(NaiveTime::MIN);
    meia_noite
        .and_local_timezone(Local)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| meia_noite.and_utc())
}

/// Dia da liquidação: `settlement_date`, ou a data local da última atualização.
fn dia_liquidacao(row: &LiquidacaoRow) -> Option<NaiveDate> {
    row.settlement_date
        .or_else(|| row.data_atualizacao.map(|t| t.with_timezone(&Local).date_naive()))
}

/// Série diária terminando em `hoje`, com todos os dias presentes.
pub fn build_series(periodo: Periodo, hoje: NaiveDate, rows: &[LiquidacaoRow]) -> LiquidadosPorPeriodo {
    let inicio = hoje - Duration::days(periodo.dias() - 1);

    let dados: Vec<LiquidacaoDia> = inicio
        .iter_days()
        .take_while(|d| *d <= hoje)
        .map(|dia| {
            let do_dia: Vec<&LiquidacaoRow> =
                rows.iter().filter(|r| dia_liquidacao(r) == Some(dia)).collect();
            LiquidacaoDia {
                data: dia.format("%d/%m").to_string(),
                dia_semana: DIAS_SEMANA[dia.weekday().num_days_from_sunday() as usize].to_string(),
                valor: do_dia.iter().map(|r| r.nominal_value).sum(),
                quantidade: do_dia.len() as i64,
                data_completa: dia.format("%Y-%m-%d").to_string(),
            }
        })
        .collect();

    LiquidadosPorPeriodo {
        periodo: periodo.as_str().to_string(),
        data_inicio: inicio.format("%d/%m/%Y").to_string(),
        data_fim: hoje.format("%d/%m/%Y").to_string(),
        total_dias: periodo.dias(),
        valor_total: dados.iter().map(|d| d.valor).sum::<Decimal>(),
        quantidade_total: dados.iter().map(|d| d.quantidade).sum(),
        dados,
    }
}
