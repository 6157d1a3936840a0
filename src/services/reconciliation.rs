// src/services/reconciliation.rs
//
// Reconciliação do status local com o banco: sincronização individual, em
// lote, consultas de status e recuperação de intenções interrompidas.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    config::BoletoSettings,
    db::BoletoStore,
    models::{
        auth::Caller,
        boleto::{
            Boleto, BoletoStatus, BulkSyncReport, NovoEvento, RecoveryReport, StatusChange, SyncFailure,
            TipoEvento,
        },
    },
    registrar::{parse_bank_date, QueryType, RegistrarClient, RegistrarError, StatusResponse},
};

const CODIGO_REGISTRO_INTERROMPIDO: &str = "REGISTRO_INTERROMPIDO";
const MENSAGEM_REGISTRO_INTERROMPIDO: &str =
    "Registro interrompido antes da confirmação do banco. Reenvie o boleto.";

/// Classificação do status textual devolvido pelo banco.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalStatus {
    Paid,
    PastDue,
    Open,
    Unknown,
    Missing,
}

pub fn classify_external_status(raw: Option<&str>) -> ExternalStatus {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ExternalStatus::Missing;
    };
    match raw.to_uppercase().as_str() {
        "LIQUIDADO" | "PAID" | "SETTLED" | "PAGO" => ExternalStatus::Paid,
        "VENCIDO" | "OVERDUE" | "PAST_DUE" | "EXPIRED" => ExternalStatus::PastDue,
        "ATIVO" | "REGISTRADO" | "REGISTERED" | "OPEN" | "ACTIVE" => ExternalStatus::Open,
        // BAIXADO, LIQUIDADO PARCIALMENTE e afins não mudam o status local
        _ => ExternalStatus::Unknown,
    }
}

/// Aplica a resposta do banco ao boleto. Devolve o novo status quando ele
/// mudou. Registros terminais não são tocados.
pub fn apply_status_response(
    boleto: &mut Boleto,
    response: &StatusResponse,
    now: DateTime<Utc>,
) -> Option<BoletoStatus> {
    if boleto.status.is_terminal() {
        return None;
    }

    let atual = boleto.status;
    let destino = match classify_external_status(response.status.as_deref()) {
        ExternalStatus::Paid => Some(BoletoStatus::Liquidado),
        ExternalStatus::PastDue => Some(BoletoStatus::Vencido),
        ExternalStatus::Open if atual == BoletoStatus::Erro => Some(BoletoStatus::Registrado),
        ExternalStatus::Open | ExternalStatus::Missing => None,
        ExternalStatus::Unknown => {
            tracing::warn!(
                boleto_id = boleto.id,
                status_banco = response.status.as_deref().unwrap_or_default(),
                "⚠️ Status desconhecido retornado pelo banco, mantendo status local"
            );
            None
        }
    };

    let mut mudou = None;
    if let Some(destino) = destino.filter(|d| *d != atual) {
        if atual.can_transition_to(destino) {
            boleto.status = destino;
            mudou = Some(destino);
        } else {
            tracing::warn!(
                boleto_id = boleto.id,
                de = %atual,
                para = %destino,
                "⚠️ Transição inválida ignorada na sincronização"
            );
        }
    }

    if boleto.status == BoletoStatus::Liquidado {
        if let Some(valor) = paid_value(response) {
            boleto.paid_value = Some(valor);
        }
        if let Some(data) = settlement_date(response) {
            boleto.settlement_date = Some(data);
        }
    }
    if boleto.status == BoletoStatus::Registrado && atual == BoletoStatus::Erro {
        boleto.clear_error();
    }

    fill_artifacts(boleto, response);
    boleto.data_atualizacao = Some(now);
    mudou
}

/// Preenche apenas os artefatos que ainda estão vazios localmente.
pub fn fill_artifacts(boleto: &mut Boleto, response: &StatusResponse) {
    fn fill(local: &mut Option<String>, remoto: &Option<String>) {
        let vazio = local.as_deref().is_none_or(|v| v.trim().is_empty());
        if vazio {
            if let Some(valor) = remoto.as_deref().filter(|v| !v.trim().is_empty()) {
                *local = Some(valor.to_string());
            }
        }
    }

    fill(&mut boleto.bar_code, &response.bar_code);
    fill(&mut boleto.digitable_line, &response.digitable_line);
    fill(&mut boleto.qr_code_pix, &response.qr_code_pix);
    fill(&mut boleto.qr_code_url, &response.qr_code_url);
    if boleto.entry_date.is_none() {
        boleto.entry_date = response.entry_date.as_deref().and_then(parse_bank_date);
    }
}

fn paid_value(response: &StatusResponse) -> Option<Decimal> {
    response
        .paid_value
        .or_else(|| response.settlements.iter().find_map(|s| s.settlement_value))
}

fn settlement_date(response: &StatusResponse) -> Option<NaiveDate> {
    response
        .settlement_date
        .as_deref()
        .and_then(parse_bank_date)
        .or_else(|| {
            response
                .settlements
                .iter()
                .find_map(|s| s.settlement_date.as_deref().and_then(parse_bank_date))
        })
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn BoletoStore>,
    registrar: Arc<dyn RegistrarClient>,
    settings: BoletoSettings,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn BoletoStore>,
        registrar: Arc<dyn RegistrarClient>,
        settings: BoletoSettings,
    ) -> Self {
        Self { store, registrar, settings }
    }

    async fn load(&self, id: i64) -> Result<Boleto, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Boleto {} não encontrado", id)))
    }

    // =========================================================================
    //  SINCRONIZAÇÃO
    // =========================================================================

    pub async fn sync_one(&self, caller: &Caller, id: i64) -> Result<Boleto, AppError> {
        let boleto = self.load(id).await?;
        if boleto.status == BoletoStatus::Pendente {
            return Err(AppError::InvalidState(
                "Boletos pendentes (não registrados) não podem ser sincronizados. Registre o boleto primeiro."
                    .to_string(),
            ));
        }
        if boleto.status.is_terminal() {
            tracing::info!(boleto_id = id, status = %boleto.status, "Boleto em estado final, sincronização ignorada");
            return Ok(boleto);
        }

        let response = self
            .registrar
            .query_by_bank_number(&boleto.covenant_code, &boleto.bank_number)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    boleto_id = id,
                    bank_number = %boleto.bank_number,
                    "❌ Falha ao consultar boleto no banco: {}",
                    e
                )
            })?;

        let (salvo, _) = self.reconcile(boleto, &response, caller).await?;
        Ok(salvo)
    }

    /// Aplica a resposta do banco e grava. O `bool` diz se a gravação valeu:
    /// `false` quando outra operação (um cancelamento, por exemplo) mudou o
    /// boleto durante a consulta, e então o estado atual é devolvido intacto.
    async fn reconcile(
        &self,
        mut boleto: Boleto,
        response: &StatusResponse,
        caller: &Caller,
    ) -> Result<(Boleto, bool), AppError> {
        let anterior = boleto.status;
        let mudou = apply_status_response(&mut boleto, response, Utc::now());
        boleto.atualizado_por = caller.usuario_id;

        let salvo = self
            .store
            .save(
                &boleto,
                anterior,
                NovoEvento {
                    tipo: TipoEvento::Sincronizacao,
                    status_anterior: Some(anterior),
                    status_novo: boleto.status,
                    usuario_id: caller.usuario_id,
                    detalhe: response.status.as_ref().map(|s| format!("Status no banco: {}", s)),
                },
            )
            .await?;

        if salvo.status != boleto.status {
            tracing::warn!(
                boleto_id = boleto.id,
                calculado = %boleto.status,
                atual = %salvo.status,
                "⚠️ Boleto alterado durante a sincronização, resultado do banco descartado"
            );
            return Ok((salvo, false));
        }

        if let Some(novo) = mudou {
            tracing::info!(
                boleto_id = boleto.id,
                nsu_code = %boleto.nsu_code,
                de = %anterior,
                para = %novo,
                "🔄 Status do boleto atualizado pelo banco"
            );
        }
        Ok((salvo, true))
    }

    /// Sincroniza todos os boletos ativos em REGISTRADO/ATIVO com
    /// concorrência limitada. Falha de um boleto não interrompe os demais.
    pub async fn sync_all(&self, caller: &Caller) -> Result<BulkSyncReport, AppError> {
        let candidatos = self.store.list_syncable().await?;
        if candidatos.is_empty() {
            tracing::info!("Nenhum boleto para sincronizar");
            return Ok(BulkSyncReport::default());
        }

        let total = candidatos.len();
        let concorrencia = self.settings.sync_concurrency.max(1);
        tracing::info!(total, concorrencia, "🔄 Iniciando sincronização em lote");

        let mut resultados: Vec<_> = stream::iter(candidatos)
            .map(|boleto| async move {
                let id = boleto.id;
                let nsu_code = boleto.nsu_code.clone();
                let anterior = boleto.status;
                let resultado = match self
                    .registrar
                    .query_by_bank_number(&boleto.covenant_code, &boleto.bank_number)
                    .await
                {
                    Ok(response) => self.reconcile(boleto, &response, caller).await,
                    Err(e) => Err(AppError::from(e)),
                };
                (id, nsu_code, anterior, resultado)
            })
            .buffer_unordered(concorrencia)
            .collect()
            .await;

        resultados.sort_by_key(|(id, ..)| *id);

        let mut report = BulkSyncReport { total, ..Default::default() };
        for (boleto_id, nsu_code, anterior, resultado) in resultados {
            match resultado {
                Ok((salvo, aplicado)) => {
                    report.sucesso += 1;
                    if aplicado && salvo.status != anterior {
                        report.atualizados.push(StatusChange {
                            boleto_id,
                            nsu_code,
                            status_anterior: anterior,
                            status_novo: salvo.status,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(boleto_id, nsu_code = %nsu_code, "⚠️ Falha ao sincronizar boleto: {}", e);
                    report.erros += 1;
                    report.erros_lista.push(SyncFailure { boleto_id, nsu_code, erro: e.to_string() });
                }
            }
        }

        tracing::info!(
            total = report.total,
            sucesso = report.sucesso,
            erros = report.erros,
            atualizados = report.atualizados.len(),
            "✅ Sincronização em lote concluída"
        );
        Ok(report)
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    /// Consulta pelo nosso número do boleto e reconcilia quando já registrado.
    pub async fn consultar_status(&self, caller: &Caller, id: i64) -> Result<StatusResponse, AppError> {
        let boleto = self.load(id).await?;
        let response = self
            .registrar
            .query_by_bank_number(&boleto.covenant_code, &boleto.bank_number)
            .await?;

        if boleto.status != BoletoStatus::Pendente && !boleto.status.is_terminal() {
            if let Err(e) = self.reconcile(boleto, &response, caller).await {
                tracing::warn!(boleto_id = id, "⚠️ Consulta feita, mas falhou ao gravar a reconciliação: {}", e);
            }
        }

        Ok(response)
    }

    /// Código do beneficiário informado, ou o convênio configurado.
    fn beneficiary<'a>(&'a self, informado: Option<&'a str>) -> &'a str {
        informado
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.settings.covenant_code)
    }

    pub async fn by_nosso_numero(
        &self,
        beneficiary_code: Option<&str>,
        bank_number: &str,
    ) -> Result<StatusResponse, AppError> {
        let bank_number = required("bankNumber", bank_number)?;
        Ok(self
            .registrar
            .query_by_bank_number(self.beneficiary(beneficiary_code), bank_number)
            .await?)
    }

    pub async fn by_seu_numero(
        &self,
        beneficiary_code: Option<&str>,
        client_number: &str,
        due_date: NaiveDate,
        nominal_value: Decimal,
    ) -> Result<StatusResponse, AppError> {
        let client_number = required("clientNumber", client_number)?;
        Ok(self
            .registrar
            .query_by_client_number(self.beneficiary(beneficiary_code), client_number, due_date, nominal_value)
            .await?)
    }

    pub async fn by_tipo(&self, bill_id: &str, tipo_consulta: Option<&str>) -> Result<StatusResponse, AppError> {
        let bill_id = required("billId", bill_id)?;
        let query_type = match tipo_consulta.map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => raw.parse::<QueryType>().map_err(AppError::InvalidQueryType)?,
            None => QueryType::Default,
        };
        Ok(self.registrar.query_by_bill_id(bill_id, query_type).await?)
    }

    // =========================================================================
    //  RECUPERAÇÃO NA INICIALIZAÇÃO
    // =========================================================================

    /// Resolve intenções PENDENTE mais antigas que `grace`: confirmadas no
    /// banco viram REGISTRADO, ausentes viram ERRO para reenvio manual.
    pub async fn recover_stale_pending(&self, grace: chrono::Duration) -> Result<RecoveryReport, AppError> {
        let limite = Utc::now() - grace;
        let pendentes = self.store.list_stale_pending(limite).await?;
        let mut report = RecoveryReport { analisados: pendentes.len(), ..Default::default() };
        let caller = Caller::sistema();

        for mut boleto in pendentes {
            let consulta = self
                .registrar
                .query_by_bank_number(&boleto.covenant_code, &boleto.bank_number)
                .await;

            let encontrado = match consulta {
                Ok(response) if response.is_found() => Some(response),
                Ok(_) | Err(RegistrarError::NotFound(_)) => None,
                Err(e) => {
                    tracing::warn!(
                        boleto_id = boleto.id,
                        bank_number = %boleto.bank_number,
                        "⚠️ Recuperação adiada, banco indisponível: {}",
                        e
                    );
                    report.adiados += 1;
                    continue;
                }
            };

            let destino = if let Some(response) = &encontrado {
                fill_artifacts(&mut boleto, response);
                boleto.clear_error();
                BoletoStatus::Registrado
            } else {
                boleto.error_code = Some(CODIGO_REGISTRO_INTERROMPIDO.to_string());
                boleto.error_message = Some(MENSAGEM_REGISTRO_INTERROMPIDO.to_string());
                BoletoStatus::Erro
            };

            boleto.status = destino;
            boleto.data_atualizacao = Some(Utc::now());
            let evento = NovoEvento {
                tipo: TipoEvento::Recuperacao,
                status_anterior: Some(BoletoStatus::Pendente),
                status_novo: destino,
                usuario_id: caller.usuario_id,
                detalhe: None,
            };

            match self.store.save(&boleto, BoletoStatus::Pendente, evento).await {
                Ok(salvo) if salvo.status != destino => {
                    tracing::info!(
                        boleto_id = boleto.id,
                        status = %salvo.status,
                        "Boleto já resolvido por outra operação durante a recuperação"
                    );
                }
                Ok(_) if destino == BoletoStatus::Registrado => report.registrados += 1,
                Ok(_) => report.marcados_erro += 1,
                Err(e) => {
                    tracing::error!(boleto_id = boleto.id, "❌ Falha ao gravar recuperação do boleto: {}", e);
                    report.adiados += 1;
                }
            }
        }

        if report.analisados > 0 {
            tracing::info!(
                analisados = report.analisados,
                registrados = report.registrados,
                marcados_erro = report.marcados_erro,
                adiados = report.adiados,
                "🩺 Recuperação de boletos pendentes concluída"
            );
        }
        Ok(report)
    }
}

pub(crate) fn required<'a>(campo: &str, valor: &'a str) -> Result<&'a str, AppError> {
    let valor = valor.trim();
    if valor.is_empty() {
        Err(AppError::InvalidState(format!("O parâmetro {} é obrigatório", campo)))
    } else {
        Ok(valor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::SettlementInfo;
    use rust_decimal_macros::dec;

    fn boleto(status: BoletoStatus) -> Boleto {
        let hoje = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        Boleto {
            id: 1,
            contrato_id: 7,
            nsu_code: "0620000123417".into(),
            nsu_date: hoje,
            covenant_code: "0596794".into(),
            bank_number: "1760620000417".into(),
            client_number: "CONT1".into(),
            due_date: hoje,
            issue_date: hoje,
            nominal_value: dec!(150.00),
            document_kind: "DUPLICATA_MERCANTIL".into(),
            fine_percentage: None,
            fine_quantity_days: None,
            interest_percentage: None,
            deduction_value: None,
            write_off_quantity_days: None,
            messages: None,
            payer_name: "Maria".into(),
            payer_document_type: crate::models::boleto::DocumentType::Cpf,
            payer_document_number: "12345678901".into(),
            payer_address: "Rua A 1".into(),
            payer_neighborhood: "Centro".into(),
            payer_city: "Santos".into(),
            payer_state: "SP".into(),
            payer_zip_code: "11000-000".into(),
            status,
            bar_code: None,
            digitable_line: None,
            entry_date: None,
            qr_code_pix: None,
            qr_code_url: None,
            paid_value: None,
            settlement_date: None,
            error_code: None,
            error_message: None,
            trace_id: None,
            ativo: true,
            data_cadastro: Utc::now(),
            data_atualizacao: None,
            criado_por: None,
            atualizado_por: None,
        }
    }

    fn resposta(status: &str) -> StatusResponse {
        StatusResponse { status: Some(status.into()), ..StatusResponse::empty("default") }
    }

    #[test]
    fn classifies_external_status_case_insensitively() {
        assert_eq!(classify_external_status(Some("pago")), ExternalStatus::Paid);
        assert_eq!(classify_external_status(Some("Past_Due")), ExternalStatus::PastDue);
        assert_eq!(classify_external_status(Some(" active ")), ExternalStatus::Open);
        assert_eq!(classify_external_status(Some("BAIXADO")), ExternalStatus::Unknown);
        assert_eq!(classify_external_status(Some("")), ExternalStatus::Missing);
        assert_eq!(classify_external_status(None), ExternalStatus::Missing);
    }

    #[test]
    fn paid_moves_to_liquidado_with_settlement_data() {
        let mut b = boleto(BoletoStatus::Registrado);
        let mut r = resposta("LIQUIDADO");
        r.paid_value = Some(dec!(150.00));
        r.settlement_date = Some("2026-10-15".into());
        r.bar_code = Some("0339912345".into());

        assert_eq!(apply_status_response(&mut b, &r, Utc::now()), Some(BoletoStatus::Liquidado));
        assert_eq!(b.paid_value, Some(dec!(150.00)));
        assert_eq!(b.settlement_date, NaiveDate::from_ymd_opt(2026, 10, 15));
        assert_eq!(b.bar_code.as_deref(), Some("0339912345"));
        assert!(b.data_atualizacao.is_some());
    }

    #[test]
    fn settlement_falls_back_to_settlement_list() {
        let mut b = boleto(BoletoStatus::Vencido);
        let mut r = resposta("PAID");
        r.settlements.push(SettlementInfo {
            settlement_date: Some("14/10/2026".into()),
            settlement_value: Some(dec!(151.20)),
            ..Default::default()
        });

        apply_status_response(&mut b, &r, Utc::now());
        assert_eq!(b.status, BoletoStatus::Liquidado);
        assert_eq!(b.paid_value, Some(dec!(151.20)));
        assert_eq!(b.settlement_date, NaiveDate::from_ymd_opt(2026, 10, 14));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let mut b = boleto(BoletoStatus::Registrado);
        let r = resposta("VENCIDO");
        let agora = Utc::now();

        assert_eq!(apply_status_response(&mut b, &r, agora), Some(BoletoStatus::Vencido));
        let primeira = format!("{:?}", b);
        assert_eq!(apply_status_response(&mut b, &r, agora), None);
        assert_eq!(format!("{:?}", b), primeira);
    }

    #[test]
    fn terminal_records_are_untouched() {
        for status in [BoletoStatus::Liquidado, BoletoStatus::Cancelado] {
            let mut b = boleto(status);
            let mut r = resposta("VENCIDO");
            r.bar_code = Some("123".into());
            assert_eq!(apply_status_response(&mut b, &r, Utc::now()), None);
            assert_eq!(b.status, status);
            assert!(b.bar_code.is_none());
            assert!(b.data_atualizacao.is_none());
        }
    }

    #[test]
    fn open_status_recovers_error_records_only() {
        let mut b = boleto(BoletoStatus::Erro);
        b.error_code = Some("API_ERROR".into());
        assert_eq!(apply_status_response(&mut b, &resposta("ATIVO"), Utc::now()), Some(BoletoStatus::Registrado));
        assert!(b.error_code.is_none());

        let mut b = boleto(BoletoStatus::Ativo);
        assert_eq!(apply_status_response(&mut b, &resposta("REGISTERED"), Utc::now()), None);
        assert_eq!(b.status, BoletoStatus::Ativo);
    }

    #[test]
    fn invalid_transition_is_ignored() {
        // ERRO -> VENCIDO não existe na tabela
        let mut b = boleto(BoletoStatus::Erro);
        assert_eq!(apply_status_response(&mut b, &resposta("OVERDUE"), Utc::now()), None);
        assert_eq!(b.status, BoletoStatus::Erro);
    }

    #[test]
    fn artifacts_are_filled_only_when_empty() {
        let mut b = boleto(BoletoStatus::Registrado);
        b.digitable_line = Some("local".into());
        let mut r = resposta("ATIVO");
        r.digitable_line = Some("remota".into());
        r.qr_code_url = Some("https://qr".into());
        r.entry_date = Some("2026-10-16T10:00:00".into());

        apply_status_response(&mut b, &r, Utc::now());
        assert_eq!(b.digitable_line.as_deref(), Some("local"));
        assert_eq!(b.qr_code_url.as_deref(), Some("https://qr"));
        assert_eq!(b.entry_date, NaiveDate::from_ymd_opt(2026, 10, 16));
    }
}
