// tests/common/mod.rs
//
// Store em memória e banco registrador programável, para exercitar os
// serviços sem Postgres e sem rede.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::Notify;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crm_boletos::{
    common::error::AppError,
    config::{AppState, BoletoSettings},
    db::BoletoStore,
    models::{
        auth::Caller,
        boleto::{Boleto, BoletoEvento, BoletoStatus, DadosEmissao, DocumentType, NovoBoleto, NovoEvento, TipoEvento},
        contrato::{ClientePagador, ContratoPagador, DadosPessoa, Endereco, TipoPessoa},
        dashboard::{FaturamentoRow, LiquidacaoRow, StatusTotal},
    },
    registrar::{QueryType, RegistrarClient, RegistrarError, RegistrationReceipt, StatusResponse},
};

pub const JWT_SECRET: &str = "segredo-de-teste";

// =============================================================================
//  STORE EM MEMÓRIA
// =============================================================================

#[derive(Default)]
struct Inner {
    boletos: Vec<Boleto>,
    eventos: Vec<BoletoEvento>,
    contratos: HashMap<i64, ContratoPagador>,
    next_id: i64,
    duplicadas_restantes: usize,
    last_client_number_falha: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_contrato(&self, contrato: ContratoPagador) {
        self.inner.lock().unwrap().contratos.insert(contrato.contrato_id, contrato);
    }

    /// As próximas `n` inserções falham com colisão de identificador.
    pub fn fail_next_inserts(&self, n: usize) {
        self.inner.lock().unwrap().duplicadas_restantes = n;
    }

    pub fn fail_last_client_number(&self) {
        self.inner.lock().unwrap().last_client_number_falha = true;
    }

    /// Grava um boleto pronto (id atribuído pelo store).
    pub fn seed(&self, mut boleto: Boleto) -> Boleto {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        boleto.id = inner.next_id;
        inner.boletos.push(boleto.clone());
        boleto
    }

    pub fn boleto(&self, id: i64) -> Boleto {
        self.inner
            .lock()
            .unwrap()
            .boletos
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .expect("boleto inexistente no store de teste")
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().boletos.len()
    }

    pub fn event_types(&self, boleto_id: i64) -> Vec<TipoEvento> {
        self.inner
            .lock()
            .unwrap()
            .eventos
            .iter()
            .filter(|e| e.boleto_id == boleto_id)
            .map(|e| e.tipo)
            .collect()
    }

    fn push_evento(inner: &mut Inner, boleto_id: i64, evento: &NovoEvento) {
        let id = inner.eventos.len() as i64 + 1;
        inner.eventos.push(BoletoEvento {
            id,
            boleto_id,
            tipo: evento.tipo,
            status_anterior: evento.status_anterior,
            status_novo: evento.status_novo,
            usuario_id: evento.usuario_id,
            detalhe: evento.detalhe.clone(),
            criado_em: Utc::now(),
        });
    }
}

#[async_trait]
impl BoletoStore for MemoryStore {
    async fn find_contrato_pagador(&self, contrato_id: i64) -> Result<Option<ContratoPagador>, AppError> {
        Ok(self.inner.lock().unwrap().contratos.get(&contrato_id).cloned())
    }

    async fn last_client_number(&self) -> Result<Option<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        if inner.last_client_number_falha {
            return Err(AppError::InternalServerError(anyhow::anyhow!("banco fora do ar")));
        }
        Ok(inner.boletos.iter().max_by_key(|b| b.id).map(|b| b.client_number.clone()))
    }

    async fn insert_intent(&self, novo: &NovoBoleto, caller: &Caller) -> Result<Boleto, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.duplicadas_restantes > 0 {
            inner.duplicadas_restantes -= 1;
            return Err(AppError::DuplicateIdentifier("uq_boletos_nsu_code".into()));
        }
        if inner
            .boletos
            .iter()
            .any(|b| b.nsu_code == novo.nsu_code || b.bank_number == novo.bank_number)
        {
            return Err(AppError::DuplicateIdentifier("uq_boletos_bank_number".into()));
        }

        inner.next_id += 1;
        let mut boleto = boleto_fixture(BoletoStatus::Pendente);
        boleto.id = inner.next_id;
        boleto.contrato_id = novo.contrato_id;
        boleto.nsu_code = novo.nsu_code.clone();
        boleto.nsu_date = novo.nsu_date;
        boleto.covenant_code = novo.covenant_code.clone();
        boleto.bank_number = novo.bank_number.clone();
        boleto.client_number = novo.client_number.clone();
        boleto.due_date = novo.due_date;
        boleto.issue_date = novo.issue_date;
        boleto.nominal_value = novo.nominal_value;
        boleto.document_kind = novo.document_kind.clone();
        boleto.fine_percentage = novo.fine_percentage;
        boleto.fine_quantity_days = novo.fine_quantity_days;
        boleto.interest_percentage = novo.interest_percentage;
        boleto.deduction_value = novo.deduction_value;
        boleto.write_off_quantity_days = novo.write_off_quantity_days;
        boleto.messages = novo.messages.clone();
        boleto.payer_name = novo.payer.name.clone();
        boleto.payer_document_type = novo.payer.document_type;
        boleto.payer_document_number = novo.payer.document_number.clone();
        boleto.payer_address = novo.payer.address.clone();
        boleto.payer_neighborhood = novo.payer.neighborhood.clone();
        boleto.payer_city = novo.payer.city.clone();
        boleto.payer_state = novo.payer.state.clone();
        boleto.payer_zip_code = novo.payer.zip_code.clone();
        boleto.criado_por = caller.usuario_id;
        boleto.data_cadastro = Utc::now();

        inner.boletos.push(boleto.clone());
        let evento = NovoEvento {
            tipo: TipoEvento::Criacao,
            status_anterior: None,
            status_novo: BoletoStatus::Pendente,
            usuario_id: caller.usuario_id,
            detalhe: None,
        };
        Self::push_evento(&mut inner, boleto.id, &evento);
        Ok(boleto)
    }

    async fn save(&self, boleto: &Boleto, esperado: BoletoStatus, evento: NovoEvento) -> Result<Boleto, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let atual = inner
            .boletos
            .iter_mut()
            .find(|b| b.id == boleto.id)
            .ok_or_else(|| AppError::NotFound(format!("Boleto {} não encontrado", boleto.id)))?;

        // Mesmo guarda do `WHERE status = $16` do repositório
        if atual.status != esperado {
            return Ok(atual.clone());
        }

        // Mesmas colunas do UPDATE do repositório
        atual.status = boleto.status;
        atual.bar_code = boleto.bar_code.clone();
        atual.digitable_line = boleto.digitable_line.clone();
        atual.entry_date = boleto.entry_date;
        atual.qr_code_pix = boleto.qr_code_pix.clone();
        atual.qr_code_url = boleto.qr_code_url.clone();
        atual.paid_value = boleto.paid_value;
        atual.settlement_date = boleto.settlement_date;
        atual.error_code = boleto.error_code.clone();
        atual.error_message = boleto.error_message.clone();
        atual.trace_id = boleto.trace_id.clone();
        atual.ativo = boleto.ativo;
        atual.data_atualizacao = boleto.data_atualizacao;
        atual.atualizado_por = boleto.atualizado_por;
        let salvo = atual.clone();

        Self::push_evento(&mut inner, boleto.id, &evento);
        Ok(salvo)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Boleto>, AppError> {
        Ok(self.inner.lock().unwrap().boletos.iter().find(|b| b.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Boleto>, AppError> {
        Ok(self.inner.lock().unwrap().boletos.iter().filter(|b| b.ativo).cloned().collect())
    }

    async fn list_by_contrato(&self, contrato_id: i64) -> Result<Vec<Boleto>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .boletos
            .iter()
            .filter(|b| b.contrato_id == contrato_id)
            .cloned()
            .collect())
    }

    async fn list_syncable(&self) -> Result<Vec<Boleto>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .boletos
            .iter()
            .filter(|b| b.ativo && matches!(b.status, BoletoStatus::Registrado | BoletoStatus::Ativo))
            .cloned()
            .collect())
    }

    async fn list_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Boleto>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .boletos
            .iter()
            .filter(|b| b.status == BoletoStatus::Pendente && b.data_cadastro < older_than)
            .cloned()
            .collect())
    }

    async fn list_events(&self, boleto_id: i64) -> Result<Vec<BoletoEvento>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .eventos
            .iter()
            .filter(|e| e.boleto_id == boleto_id)
            .cloned()
            .collect())
    }

    async fn status_totals(&self) -> Result<Vec<StatusTotal>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut totais: HashMap<BoletoStatus, (i64, Decimal)> = HashMap::new();
        for b in &inner.boletos {
            let entry = totais.entry(b.status).or_default();
            entry.0 += 1;
            entry.1 += b.nominal_value;
        }
        Ok(totais
            .into_iter()
            .map(|(status, (quantidade, valor_total))| StatusTotal { status, quantidade, valor_total })
            .collect())
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        Ok(self.inner.lock().unwrap().boletos.iter().filter(|b| b.data_cadastro >= since).count() as i64)
    }

    async fn liquidados_desde(&self, desde: NaiveDate) -> Result<Vec<LiquidacaoRow>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .boletos
            .iter()
            .filter(|b| b.status == BoletoStatus::Liquidado)
            .filter(|b| {
                let dia = b.settlement_date.or(b.data_atualizacao.map(|t| t.date_naive()));
                dia.is_some_and(|d| d >= desde.pred_opt().unwrap_or(desde))
            })
            .map(|b| LiquidacaoRow {
                nominal_value: b.nominal_value,
                settlement_date: b.settlement_date,
                data_atualizacao: b.data_atualizacao,
            })
            .collect())
    }

    async fn faturamento_por_cliente(&self) -> Result<Vec<FaturamentoRow>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<FaturamentoRow> = inner
            .boletos
            .iter()
            .filter_map(|b| {
                let cliente = inner.contratos.get(&b.contrato_id)?.cliente.as_ref()?;
                let dados = cliente.dados_pagador().map(|(_, p)| p);
                Some(FaturamentoRow {
                    cliente_id: cliente.cliente_id,
                    tipo_pessoa: cliente.tipo_pessoa,
                    cliente_nome: dados.map(|p| p.nome.clone()),
                    cliente_documento: dados.and_then(|p| p.documento.clone()),
                    boleto_id: b.id,
                    contrato_id: b.contrato_id,
                    nsu_code: b.nsu_code.clone(),
                    issue_date: b.issue_date,
                    due_date: b.due_date,
                    settlement_date: b.settlement_date,
                    nominal_value: b.nominal_value,
                    status: b.status,
                    payer_name: b.payer_name.clone(),
                    payer_document_number: b.payer_document_number.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|r| (r.cliente_id, r.due_date, r.boleto_id));
        Ok(rows)
    }
}

// =============================================================================
//  BANCO REGISTRADOR PROGRAMÁVEL
// =============================================================================

pub struct FakeRegistrar {
    register_result: Mutex<Result<RegistrationReceipt, RegistrarError>>,
    query_default: Mutex<Result<StatusResponse, RegistrarError>>,
    query_by_bank: Mutex<HashMap<String, Result<StatusResponse, RegistrarError>>>,
    cancel_result: Mutex<Result<(), RegistrarError>>,
    pdf_link: Mutex<Result<String, RegistrarError>>,
    pub register_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub last_query_type: Mutex<Option<QueryType>>,
    pub last_beneficiary: Mutex<Option<String>>,
    query_gate: Mutex<Option<Portao>>,
    cancel_gate: Mutex<Option<Portao>>,
}

/// Par de sinais para segurar uma chamada no meio: `entrou` dispara quando a
/// chamada começa, e ela só termina depois de `liberar`.
#[derive(Clone, Default)]
pub struct Portao {
    pub entrou: Arc<Notify>,
    pub liberar: Arc<Notify>,
}

impl Portao {
    async fn atravessar(&self) {
        self.entrou.notify_one();
        self.liberar.notified().await;
    }
}

impl FakeRegistrar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            register_result: Mutex::new(Ok(receipt())),
            query_default: Mutex::new(Ok(status_response("ATIVO"))),
            query_by_bank: Mutex::new(HashMap::new()),
            cancel_result: Mutex::new(Ok(())),
            pdf_link: Mutex::new(Ok("https://banco.test/boleto.pdf".into())),
            register_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            last_query_type: Mutex::new(None),
            last_beneficiary: Mutex::new(None),
            query_gate: Mutex::new(None),
            cancel_gate: Mutex::new(None),
        })
    }

    pub fn on_register(&self, result: Result<RegistrationReceipt, RegistrarError>) {
        *self.register_result.lock().unwrap() = result;
    }

    pub fn on_query(&self, result: Result<StatusResponse, RegistrarError>) {
        *self.query_default.lock().unwrap() = result;
    }

    pub fn on_query_bank_number(&self, bank_number: &str, result: Result<StatusResponse, RegistrarError>) {
        self.query_by_bank.lock().unwrap().insert(bank_number.to_string(), result);
    }

    pub fn on_cancel(&self, result: Result<(), RegistrarError>) {
        *self.cancel_result.lock().unwrap() = result;
    }

    pub fn on_pdf_link(&self, result: Result<String, RegistrarError>) {
        *self.pdf_link.lock().unwrap() = result;
    }

    /// As consultas por nosso número passam a esperar no portão devolvido.
    pub fn hold_queries(&self) -> Portao {
        let portao = Portao::default();
        *self.query_gate.lock().unwrap() = Some(portao.clone());
        portao
    }

    /// A baixa no banco passa a esperar no portão devolvido.
    pub fn hold_cancels(&self) -> Portao {
        let portao = Portao::default();
        *self.cancel_gate.lock().unwrap() = Some(portao.clone());
        portao
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.register_calls.load(Ordering::SeqCst),
            self.query_calls.load(Ordering::SeqCst),
            self.cancel_calls.load(Ordering::SeqCst),
        )
    }

    fn query(&self) -> Result<StatusResponse, RegistrarError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.query_default.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrarClient for FakeRegistrar {
    async fn register(&self, _boleto: &Boleto) -> Result<RegistrationReceipt, RegistrarError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.register_result.lock().unwrap().clone()
    }

    async fn query_by_bank_number(
        &self,
        beneficiary_code: &str,
        bank_number: &str,
    ) -> Result<StatusResponse, RegistrarError> {
        *self.last_beneficiary.lock().unwrap() = Some(beneficiary_code.to_string());
        let portao = self.query_gate.lock().unwrap().clone();
        if let Some(portao) = portao {
            portao.atravessar().await;
        }
        let especifico = self.query_by_bank.lock().unwrap().get(bank_number).cloned();
        match especifico {
            Some(result) => {
                self.query_calls.fetch_add(1, Ordering::SeqCst);
                result
            }
            None => self.query(),
        }
    }

    async fn query_by_client_number(
        &self,
        beneficiary_code: &str,
        _client_number: &str,
        _due_date: NaiveDate,
        _nominal_value: Decimal,
    ) -> Result<StatusResponse, RegistrarError> {
        *self.last_beneficiary.lock().unwrap() = Some(beneficiary_code.to_string());
        self.query()
    }

    async fn query_by_bill_id(&self, _bill_id: &str, query_type: QueryType) -> Result<StatusResponse, RegistrarError> {
        *self.last_query_type.lock().unwrap() = Some(query_type);
        self.query()
    }

    async fn cancel(&self, _covenant_code: &str, _bank_number: &str, _nsu_date: NaiveDate) -> Result<(), RegistrarError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let portao = self.cancel_gate.lock().unwrap().clone();
        if let Some(portao) = portao {
            portao.atravessar().await;
        }
        self.cancel_result.lock().unwrap().clone()
    }

    async fn fetch_pdf_link(
        &self,
        _bank_number: &str,
        _covenant_code: &str,
        _payer_document_number: &str,
    ) -> Result<String, RegistrarError> {
        self.pdf_link.lock().unwrap().clone()
    }

    async fn download_pdf(&self, _url: &str) -> Result<Vec<u8>, RegistrarError> {
        Ok(b"%PDF-1.4 teste".to_vec())
    }
}

// =============================================================================
//  FIXTURES
// =============================================================================

pub fn caller() -> Caller {
    Caller::usuario(42)
}

pub fn settings() -> BoletoSettings {
    BoletoSettings::default()
}

pub fn app_state(store: Arc<MemoryStore>, registrar: Arc<FakeRegistrar>) -> AppState {
    AppState::from_parts(JWT_SECRET.to_string(), store, registrar, settings())
}

pub fn receipt() -> RegistrationReceipt {
    RegistrationReceipt {
        bar_code: Some("03399000000000150009596794000000000000000417".into()),
        digitable_line: Some("03399596794000000000000000417100000000000015000".into()),
        qr_code_pix: Some("00020101021226...6304ABCD".into()),
        qr_code_url: Some("https://pix.banco.test/qr/1".into()),
        entry_date: Some(Local::now().date_naive()),
    }
}

pub fn status_response(status: &str) -> StatusResponse {
    StatusResponse {
        status: Some(status.to_string()),
        bank_number: Some("1760620000417".into()),
        ..StatusResponse::empty("default")
    }
}

pub fn rejected(code: &str) -> RegistrarError {
    RegistrarError::Rejected {
        status: 400,
        code: code.into(),
        message: "Campo payerDocumentNumber inválido".into(),
        trace_id: Some("trace-123".into()),
    }
}

/// Contrato 7, pessoa jurídica com nome e endereço "sujos".
pub fn contrato_juridico() -> ContratoPagador {
    ContratoPagador {
        contrato_id: 7,
        cliente: Some(ClientePagador {
            cliente_id: 3,
            tipo_pessoa: TipoPessoa::Juridica,
            pessoa_fisica: None,
            pessoa_juridica: Some(DadosPessoa {
                nome: "João D'Ávila & Cia.".into(),
                documento: Some("12.345.678/0001-99".into()),
                endereco: Some(Endereco {
                    logradouro: Some("Av. Paulista".into()),
                    numero: Some("1000".into()),
                    bairro: Some("Bela Vista".into()),
                    cidade: Some("São Paulo".into()),
                    estado: Some("sp".into()),
                    cep: Some("01310-100".into()),
                }),
            }),
        }),
    }
}

pub fn emissao(contrato_id: i64) -> DadosEmissao {
    DadosEmissao {
        contrato_id,
        due_date: Local::now().date_naive() + chrono::Duration::days(30),
        nominal_value: dec!(1500.00),
        ..Default::default()
    }
}

static SEQUENCIA: AtomicUsize = AtomicUsize::new(1);

/// Boleto completo no status pedido (id definido pelo store em `seed`).
pub fn boleto_fixture(status: BoletoStatus) -> Boleto {
    let hoje = Local::now().date_naive();
    let seq = SEQUENCIA.fetch_add(1, Ordering::SeqCst);
    Boleto {
        id: 0,
        contrato_id: 7,
        nsu_code: format!("{:013}", seq),
        nsu_date: hoje,
        covenant_code: "0596794".into(),
        bank_number: format!("9{:012}", seq),
        client_number: "CONT1".into(),
        due_date: hoje + chrono::Duration::days(30),
        issue_date: hoje,
        nominal_value: dec!(150.00),
        document_kind: "DUPLICATA_MERCANTIL".into(),
        fine_percentage: None,
        fine_quantity_days: None,
        interest_percentage: None,
        deduction_value: None,
        write_off_quantity_days: None,
        messages: None,
        payer_name: "Maria Souza".into(),
        payer_document_type: DocumentType::Cpf,
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
