// src/services/boleto_service.rs

use std::sync::Arc;

use chrono::{Local, Utc};

use crate::{
    common::error::AppError,
    config::BoletoSettings,
    db::BoletoStore,
    models::{
        auth::Caller,
        boleto::{
            Boleto, BoletoEvento, BoletoStatus, DadosEmissao, NovoBoleto, NovoEvento, PayerSnapshot,
            TipoEvento,
        },
        contrato::ClientePagador,
    },
    registrar::{RegistrarClient, RegistrationReceipt},
    services::{identifiers, sanitizer},
};

// Colisões de NSU/nosso número: regera até este número de tentativas
const MAX_TENTATIVAS_IDENTIFICADOR: usize = 3;
const ERROR_MESSAGE_MAX_LEN: usize = 500;
const TRACE_ID_MAX_LEN: usize = 50;

/// PDF pronto para download.
#[derive(Debug, Clone)]
pub struct BoletoPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct BoletoService {
    store: Arc<dyn BoletoStore>,
    registrar: Arc<dyn RegistrarClient>,
    settings: BoletoSettings,
}

impl BoletoService {
    pub fn new(
        store: Arc<dyn BoletoStore>,
        registrar: Arc<dyn RegistrarClient>,
        settings: BoletoSettings,
    ) -> Self {
        Self { store, registrar, settings }
    }

    // =========================================================================
    //  EMISSÃO
    // =========================================================================

    /// Grava a intenção (PENDENTE), envia ao banco e confirma o resultado.
    /// Falha do banco não é erro da operação: o boleto volta em ERRO.
    pub async fn create(&self, caller: &Caller, dados: DadosEmissao) -> Result<Boleto, AppError> {
        let contrato = self
            .store
            .find_contrato_pagador(dados.contrato_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Contrato {} não encontrado", dados.contrato_id)))?;

        let cliente = contrato.cliente.as_ref().ok_or_else(|| {
            AppError::InvalidState(format!("Contrato {} não possui cliente associado", contrato.contrato_id))
        })?;

        let payer = build_payer_snapshot(cliente).ok_or_else(|| {
            AppError::InvalidState(format!(
                "Cliente {} não possui dados de pessoa física ou jurídica",
                cliente.cliente_id
            ))
        })?;

        let client_number = match dados.client_number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(informado) => identifiers::normalize_client_number(informado),
            None => self.next_client_number().await,
        };

        let hoje = Local::now().date_naive();
        let mut tentativa = 0;
        let boleto = loop {
            tentativa += 1;
            let novo = NovoBoleto {
                contrato_id: dados.contrato_id,
                nsu_code: identifiers::next_nsu_code(),
                nsu_date: hoje,
                covenant_code: self.settings.covenant_code.clone(),
                bank_number: identifiers::next_bank_number(),
                client_number: client_number.clone(),
                due_date: dados.due_date,
                issue_date: dados.issue_date.unwrap_or(hoje),
                nominal_value: dados.nominal_value,
                document_kind: self.settings.document_kind.clone(),
                fine_percentage: dados.fine_percentage,
                fine_quantity_days: dados.fine_quantity_days,
                interest_percentage: dados.interest_percentage,
                deduction_value: dados.deduction_value,
                write_off_quantity_days: dados.write_off_quantity_days,
                messages: dados.messages.clone(),
                payer: payer.clone(),
            };

            match self.store.insert_intent(&novo, caller).await {
                Ok(boleto) => break boleto,
                Err(AppError::DuplicateIdentifier(constraint)) if tentativa < MAX_TENTATIVAS_IDENTIFICADOR => {
                    tracing::warn!(
                        tentativa,
                        constraint = %constraint,
                        nsu_code = %novo.nsu_code,
                        bank_number = %novo.bank_number,
                        "⚠️ Identificador duplicado, gerando novamente"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            boleto_id = boleto.id,
            contrato_id = boleto.contrato_id,
            nsu_code = %boleto.nsu_code,
            bank_number = %boleto.bank_number,
            "📝 Intenção de boleto gravada, enviando ao banco"
        );

        self.submit(boleto, caller).await
    }

    /// Reenvia um boleto em ERRO com os mesmos identificadores.
    pub async fn resubmit(&self, caller: &Caller, id: i64) -> Result<Boleto, AppError> {
        let mut boleto = self.get(id).await?;
        if boleto.status != BoletoStatus::Erro {
            return Err(AppError::InvalidState(format!(
                "Apenas boletos com status ERRO podem ser reenviados (status atual: {})",
                boleto.status
            )));
        }

        boleto.clear_error();
        tracing::info!(boleto_id = id, nsu_code = %boleto.nsu_code, "🔁 Reenviando boleto ao banco");
        self.submit(boleto, caller).await
    }

    async fn submit(&self, mut boleto: Boleto, caller: &Caller) -> Result<Boleto, AppError> {
        let anterior = boleto.status;

        let evento = match self.registrar.register(&boleto).await {
            Ok(receipt) => {
                ensure_transition(&boleto, BoletoStatus::Registrado)?;
                apply_receipt(&mut boleto, receipt);
                boleto.clear_error();
                boleto.status = BoletoStatus::Registrado;

                tracing::info!(
                    boleto_id = boleto.id,
                    nsu_code = %boleto.nsu_code,
                    bank_number = %boleto.bank_number,
                    "✅ Boleto registrado no banco"
                );

                NovoEvento {
                    tipo: TipoEvento::Registro,
                    status_anterior: Some(anterior),
                    status_novo: BoletoStatus::Registrado,
                    usuario_id: caller.usuario_id,
                    detalhe: None,
                }
            }
            Err(e) => {
                ensure_transition(&boleto, BoletoStatus::Erro)?;
                tracing::error!(
                    boleto_id = boleto.id,
                    nsu_code = %boleto.nsu_code,
                    bank_number = %boleto.bank_number,
                    trace_id = e.trace_id().unwrap_or("-"),
                    "❌ Falha ao registrar boleto no banco: {}",
                    e
                );

                boleto.status = BoletoStatus::Erro;
                boleto.error_code = Some(e.code());
                boleto.error_message = Some(truncate(&e.to_string(), ERROR_MESSAGE_MAX_LEN));
                boleto.trace_id = e.trace_id().map(|t| truncate(t, TRACE_ID_MAX_LEN));

                NovoEvento {
                    tipo: TipoEvento::FalhaRegistro,
                    status_anterior: Some(anterior),
                    status_novo: BoletoStatus::Erro,
                    usuario_id: caller.usuario_id,
                    detalhe: boleto.error_message.clone(),
                }
            }
        };

        boleto.data_atualizacao = Some(Utc::now());
        boleto.atualizado_por = caller.usuario_id;
        self.store.save(&boleto, anterior, evento).await
    }

    async fn next_client_number(&self) -> String {
        let prefix = &self.settings.client_number_prefix;
        match self.store.last_client_number().await {
            Ok(last) => identifiers::next_client_number(prefix, last.as_deref(), Utc::now()),
            Err(e) => {
                tracing::warn!("⚠️ Não foi possível ler o último número de cliente: {}", e);
                identifiers::client_number_fallback(prefix, Utc::now())
            }
        }
    }

    // =========================================================================
    //  CANCELAMENTO
    // =========================================================================

    /// Cancela localmente. A baixa no banco é tentada quando o título está
    /// vivo lá, mas falha do banco não impede o cancelamento local.
    pub async fn cancel(&self, caller: &Caller, id: i64) -> Result<(), AppError> {
        let mut boleto = self.get(id).await?;

        match boleto.status {
            BoletoStatus::Liquidado => {
                return Err(AppError::InvalidState(
                    "Não é possível cancelar um boleto liquidado".to_string(),
                ));
            }
            BoletoStatus::Cancelado => {
                tracing::info!(boleto_id = id, "Boleto já cancelado, nada a fazer");
                return Ok(());
            }
            _ => {}
        }

        if boleto.status.is_live_at_bank() {
            if let Err(e) = self
                .registrar
                .cancel(&boleto.covenant_code, &boleto.bank_number, boleto.nsu_date)
                .await
            {
                tracing::warn!(
                    boleto_id = id,
                    bank_number = %boleto.bank_number,
                    "⚠️ Falha ao baixar boleto no banco, cancelando apenas localmente: {}",
                    e
                );
            }
        }

        let anterior = boleto.status;
        ensure_transition(&boleto, BoletoStatus::Cancelado)?;
        boleto.status = BoletoStatus::Cancelado;
        boleto.ativo = false;
        boleto.data_atualizacao = Some(Utc::now());
        boleto.atualizado_por = caller.usuario_id;

        let salvo = self
            .store
            .save(
                &boleto,
                anterior,
                NovoEvento {
                    tipo: TipoEvento::Cancelamento,
                    status_anterior: Some(anterior),
                    status_novo: BoletoStatus::Cancelado,
                    usuario_id: caller.usuario_id,
                    detalhe: None,
                },
            )
            .await?;

        // Outra operação mudou o status enquanto o banco era chamado
        match salvo.status {
            BoletoStatus::Cancelado => {}
            BoletoStatus::Liquidado => {
                return Err(AppError::InvalidState(
                    "Não é possível cancelar um boleto liquidado".to_string(),
                ));
            }
            atual => {
                return Err(AppError::Conflict(format!(
                    "Boleto {} foi alterado por outra operação (status atual: {}). Tente novamente.",
                    id, atual
                )));
            }
        }

        tracing::info!(boleto_id = id, status_anterior = %anterior, "🗑️ Boleto cancelado");
        Ok(())
    }

    // =========================================================================
    //  LEITURAS
    // =========================================================================

    pub async fn get(&self, id: i64) -> Result<Boleto, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Boleto {} não encontrado", id)))
    }

    pub async fn list_active(&self) -> Result<Vec<Boleto>, AppError> {
        self.store.list_active().await
    }

    pub async fn list_by_contrato(&self, contrato_id: i64) -> Result<Vec<Boleto>, AppError> {
        self.store.list_by_contrato(contrato_id).await
    }

    pub async fn events(&self, id: i64) -> Result<Vec<BoletoEvento>, AppError> {
        // 404 quando o boleto não existe, em vez de lista vazia
        self.get(id).await?;
        self.store.list_events(id).await
    }

    pub async fn download_pdf(&self, id: i64) -> Result<BoletoPdf, AppError> {
        let boleto = self.get(id).await?;
        if boleto.bank_number.trim().is_empty() {
            return Err(AppError::InvalidState(format!(
                "Boleto {} não possui nosso número para gerar o PDF",
                id
            )));
        }

        let link = self
            .registrar
            .fetch_pdf_link(&boleto.bank_number, &boleto.covenant_code, &boleto.payer_document_number)
            .await
            .inspect_err(|e| tracing::error!(boleto_id = id, "❌ Falha ao obter link do PDF: {}", e))?;

        let bytes = self
            .registrar
            .download_pdf(&link)
            .await
            .inspect_err(|e| tracing::error!(boleto_id = id, "❌ Falha ao baixar PDF: {}", e))?;

        Ok(BoletoPdf {
            file_name: sanitizer::pdf_file_name(boleto.id, &boleto.payer_name, boleto.due_date),
            bytes,
        })
    }
}

/// Snapshot do pagador a partir do cadastro do cliente, já higienizado.
pub fn build_payer_snapshot(cliente: &ClientePagador) -> Option<PayerSnapshot> {
    use sanitizer::PayerField;

    let (document_type, pessoa) = cliente.dados_pagador()?;
    let endereco = pessoa.endereco.clone().unwrap_or_default();
    let linha = endereco.linha();

    Some(PayerSnapshot {
        name: sanitizer::sanitize_or(PayerField::Name, Some(&pessoa.nome), "Cliente"),
        document_type,
        document_number: sanitizer::document_number(pessoa.documento.as_deref()),
        address: sanitizer::sanitize_or(PayerField::Address, linha.as_deref(), sanitizer::DEFAULT_ADDRESS),
        neighborhood: sanitizer::sanitize_or(
            PayerField::Neighborhood,
            endereco.bairro.as_deref(),
            sanitizer::DEFAULT_NEIGHBORHOOD,
        ),
        city: sanitizer::sanitize_or(PayerField::City, endereco.cidade.as_deref(), sanitizer::DEFAULT_CITY),
        state: sanitizer::normalize_state(endereco.estado.as_deref()),
        zip_code: sanitizer::format_zip(endereco.cep.as_deref()),
    })
}

/// Copia os artefatos devolvidos pelo banco no registro.
pub(crate) fn apply_receipt(boleto: &mut Boleto, receipt: RegistrationReceipt) {
    if receipt.bar_code.is_some() {
        boleto.bar_code = receipt.bar_code;
    }
    if receipt.digitable_line.is_some() {
        boleto.digitable_line = receipt.digitable_line;
    }
    if receipt.qr_code_pix.is_some() {
        boleto.qr_code_pix = receipt.qr_code_pix;
    }
    if receipt.qr_code_url.is_some() {
        boleto.qr_code_url = receipt.qr_code_url;
    }
    if receipt.entry_date.is_some() {
        boleto.entry_date = receipt.entry_date;
    }
}

pub(crate) fn ensure_transition(boleto: &Boleto, destino: BoletoStatus) -> Result<(), AppError> {
    if boleto.status.can_transition_to(destino) {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Transição inválida para o boleto {}: {} -> {}",
            boleto.id, boleto.status, destino
        )))
    }
}

pub(crate) fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
