// src/registrar/santander.rs
//
// Cliente HTTP da API de cobrança do Santander (collection_bill_management v2).

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::{
    config::SantanderConfig,
    models::boleto::Boleto,
    registrar::{
        describe_bank_status, parse_bank_date, PayerInfo, QueryType, RegistrarClient,
        RegistrarError, RegistrationReceipt, RegistryInfo, SettlementInfo, StatusResponse,
    },
};

const TOKEN_PATH: &str = "/auth/oauth/v2/token";
const API_PREFIX: &str = "/collection_bill_management/v2";

// Renova o token 5 minutos antes de expirar
const TOKEN_SAFETY_MARGIN_SECS: u64 = 300;

/// Timeout do GET simples que baixa o PDF a partir do link do banco.
pub const PDF_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct SantanderClient {
    http: reqwest::Client,
    pdf_http: reqwest::Client,
    config: SantanderConfig,
    token: Mutex<Option<CachedToken>>,
}

impl SantanderClient {
    /// Monta o cliente com timeout e, quando configurado, o certificado mTLS
    /// (arquivo PEM com certificado e chave privada).
    pub fn new(config: SantanderConfig) -> Result<Self, RegistrarError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(path) = config.certificate_path.as_deref() {
            let pem = std::fs::read(path).map_err(|e| {
                RegistrarError::Authentication(format!("Falha ao ler certificado {}: {}", path, e))
            })?;
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                RegistrarError::Authentication(format!("Certificado inválido {}: {}", path, e))
            })?;
            builder = builder.identity(identity);
            tracing::info!(path, "✅ Certificado mTLS do Santander carregado");
        }

        let http = builder.build()?;
        let pdf_http = reqwest::Client::builder().timeout(PDF_DOWNLOAD_TIMEOUT).build()?;

        Ok(Self {
            http,
            pdf_http,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, RegistrarError> {
        let mut cache = self.token.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        tracing::debug!("Solicitando novo access token ao Santander");
        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .header("X-Application-Key", &self.config.client_id)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrarError::Authentication(format!(
                "Falha ao obter access token (HTTP {}): {}",
                status.as_u16(),
                truncate_for_log(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistrarError::Authentication(format!("Token em formato inválido: {}", e)))?;

        let ttl = token.expires_in.unwrap_or(3600).saturating_sub(TOKEN_SAFETY_MARGIN_SECS);
        tracing::info!(expira_em_min = ttl / 60, "✅ Access token do Santander gerado");

        let access_token = token.access_token;
        *cache = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(access_token)
    }

    /// Envia a requisição autenticada e converte respostas não-2xx em erro.
    async fn send(&self, request: RequestBuilder) -> Result<Response, RegistrarError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .header("X-Application-Key", &self.config.client_id)
            .send()
            .await?;

        match ensure_success(response).await {
            Err(RegistrarError::Authentication(msg)) => {
                // Token recusado: descarta o cache para a próxima chamada.
                *self.token.lock().await = None;
                Err(RegistrarError::Authentication(msg))
            }
            other => other,
        }
    }

    async fn fetch_status(&self, request: RequestBuilder, query_type: &str) -> Result<StatusResponse, RegistrarError> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        parse_status_body(&body, query_type)
    }

    fn registration_body(&self, boleto: &Boleto) -> Value {
        build_registration_body(boleto, &self.config.environment, self.pix_key())
    }

    fn pix_key(&self) -> Option<(&str, &str)> {
        self.config
            .pix_key
            .as_deref()
            .map(|key| (self.config.pix_key_type.as_str(), key))
    }

    fn bank_slip_path(&self, covenant_code: &str, bank_number: &str) -> String {
        format!(
            "{}/workspaces/{}/bank_slips/{}{}",
            API_PREFIX, self.config.workspace_id, covenant_code, bank_number
        )
    }
}

#[async_trait]
impl RegistrarClient for SantanderClient {
    async fn register(&self, boleto: &Boleto) -> Result<RegistrationReceipt, RegistrarError> {
        tracing::info!(boleto_id = boleto.id, nsu = %boleto.nsu_code, "🔔 Registrando boleto no Santander");

        let path = format!("{}/workspaces/{}/bank_slips", API_PREFIX, self.config.workspace_id);
        let request = self.http.post(self.url(&path)).json(&self.registration_body(boleto));
        let response = self.send(request).await?;
        let body = response.text().await?;

        let parsed: RegistrationResponse = serde_json::from_str(&body).map_err(|e| {
            RegistrarError::InvalidResponse(format!("{}: {}", e, truncate_for_log(&body)))
        })?;

        tracing::info!(boleto_id = boleto.id, nsu = %boleto.nsu_code, "✅ Boleto aceito pelo Santander");
        Ok(parsed.into_receipt())
    }

    async fn query_by_bank_number(
        &self,
        beneficiary_code: &str,
        bank_number: &str,
    ) -> Result<StatusResponse, RegistrarError> {
        let request = self
            .http
            .get(self.url(&format!("{}/bills", API_PREFIX)))
            .query(&[("beneficiaryCode", beneficiary_code), ("bankNumber", bank_number)]);
        self.fetch_status(request, "nosso_numero").await
    }

    async fn query_by_client_number(
        &self,
        beneficiary_code: &str,
        client_number: &str,
        due_date: NaiveDate,
        nominal_value: Decimal,
    ) -> Result<StatusResponse, RegistrarError> {
        let due_date = due_date.format("%Y-%m-%d").to_string();
        let nominal_value = format_money(nominal_value);
        let request = self
            .http
            .get(self.url(&format!("{}/bills", API_PREFIX)))
            .query(&[
                ("beneficiaryCode", beneficiary_code),
                ("clientNumber", client_number),
                ("dueDate", due_date.as_str()),
                ("nominalValue", nominal_value.as_str()),
            ]);
        self.fetch_status(request, "seu_numero").await
    }

    async fn query_by_bill_id(
        &self,
        bill_id: &str,
        query_type: QueryType,
    ) -> Result<StatusResponse, RegistrarError> {
        let request = self
            .http
            .get(self.url(&format!("{}/bills/{}", API_PREFIX, bill_id)))
            .query(&[("tipoConsulta", query_type.as_str())]);
        self.fetch_status(request, query_type.as_str()).await
    }

    async fn cancel(
        &self,
        covenant_code: &str,
        bank_number: &str,
        nsu_date: NaiveDate,
    ) -> Result<(), RegistrarError> {
        let nsu_date = nsu_date.format("%Y-%m-%d").to_string();
        let request = self
            .http
            .delete(self.url(&self.bank_slip_path(covenant_code, bank_number)))
            .query(&[("nsuDate", nsu_date.as_str())]);
        self.send(request).await?;
        tracing::info!(bank_number, "✅ Boleto baixado no Santander");
        Ok(())
    }

    async fn fetch_pdf_link(
        &self,
        bank_number: &str,
        covenant_code: &str,
        payer_document_number: &str,
    ) -> Result<String, RegistrarError> {
        let path = format!("{}/bills/{}.{}/bank_slips", API_PREFIX, bank_number, covenant_code);
        let request = self
            .http
            .post(self.url(&path))
            .json(&json!({ "payerDocumentNumber": payer_document_number }));
        let response = self.send(request).await?;
        let body = response.text().await?;
        parse_pdf_link(&body)
    }

    async fn download_pdf(&self, url: &str) -> Result<Vec<u8>, RegistrarError> {
        let response = self.pdf_http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), ""));
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Formato de fio
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationResponse {
    bar_code: Option<String>,
    digitable_line: Option<String>,
    entry_date: Option<String>,
    qr_code_pix: Option<String>,
    qr_code_url: Option<String>,
}

impl RegistrationResponse {
    fn into_receipt(self) -> RegistrationReceipt {
        RegistrationReceipt {
            bar_code: non_empty(self.bar_code),
            digitable_line: non_empty(self.digitable_line),
            qr_code_pix: non_empty(self.qr_code_pix),
            qr_code_url: non_empty(self.qr_code_url),
            entry_date: self.entry_date.as_deref().and_then(parse_bank_date),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BillPage {
    #[serde(rename = "_content", default)]
    content: Vec<BillData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillData {
    beneficiary_code: Option<Value>,
    bank_number: Option<Value>,
    client_number: Option<String>,
    nsu_code: Option<String>,
    nsu_date: Option<String>,
    status: Option<String>,
    due_date: Option<String>,
    issue_date: Option<String>,
    entry_date: Option<String>,
    settlement_date: Option<String>,
    nominal_value: Option<Value>,
    paid_value: Option<Value>,
    discount_value: Option<Value>,
    fine_value: Option<Value>,
    interest_value: Option<Value>,
    payer: Option<PayerData>,
    qr_code_pix: Option<String>,
    qr_code_url: Option<String>,
    bar_code: Option<String>,
    digitable_line: Option<String>,
    document_kind: Option<String>,
    messages: Option<Vec<Value>>,
    settlements: Option<Vec<SettlementData>>,
    registry_info: Option<RegistryData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayerData {
    name: Option<String>,
    document_type: Option<String>,
    document_number: Option<String>,
    address: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettlementData {
    settlement_type: Option<String>,
    settlement_date: Option<String>,
    settlement_value: Option<Value>,
    settlement_origin: Option<String>,
    bank_code: Option<String>,
    bank_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryData {
    registry_date: Option<String>,
    registry_number: Option<String>,
    notary_office: Option<String>,
    registry_cost: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "_errorCode")]
    error_code: Option<Value>,
    #[serde(rename = "_message")]
    message: Option<String>,
    #[serde(rename = "_details")]
    details: Option<Value>,
    #[serde(rename = "_traceId")]
    trace_id: Option<String>,
}

impl BillData {
    fn into_status_response(self, query_type: &str) -> StatusResponse {
        let status = self.status.as_deref().map(|s| s.trim().to_uppercase());
        StatusResponse {
            beneficiary_code: value_to_string(self.beneficiary_code),
            bank_number: value_to_string(self.bank_number),
            client_number: self.client_number,
            nsu_code: self.nsu_code,
            nsu_date: self.nsu_date,
            status_description: Some(describe_bank_status(self.status.as_deref())),
            status,
            due_date: self.due_date,
            issue_date: self.issue_date,
            entry_date: self.entry_date,
            settlement_date: self.settlement_date,
            nominal_value: value_to_decimal(self.nominal_value.as_ref()),
            paid_value: value_to_decimal(self.paid_value.as_ref()),
            discount_value: value_to_decimal(self.discount_value.as_ref()),
            fine_value: value_to_decimal(self.fine_value.as_ref()),
            interest_value: value_to_decimal(self.interest_value.as_ref()),
            payer: self.payer.map(|p| PayerInfo {
                name: p.name,
                document_type: p.document_type,
                document_number: p.document_number,
                address: p.address,
                neighborhood: p.neighborhood,
                city: p.city,
                state: p.state,
                zip_code: p.zip_code,
            }),
            qr_code_pix: non_empty(self.qr_code_pix),
            qr_code_url: non_empty(self.qr_code_url),
            bar_code: non_empty(self.bar_code),
            digitable_line: non_empty(self.digitable_line),
            document_kind: self.document_kind,
            messages: self
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| value_to_string(Some(m)))
                .collect(),
            settlements: self
                .settlements
                .unwrap_or_default()
                .into_iter()
                .map(|s| SettlementInfo {
                    settlement_type: s.settlement_type,
                    settlement_date: s.settlement_date,
                    settlement_value: value_to_decimal(s.settlement_value.as_ref()),
                    settlement_origin: s.settlement_origin,
                    bank_code: s.bank_code,
                    bank_branch: s.bank_branch,
                })
                .collect(),
            registry_info: self.registry_info.map(|r| RegistryInfo {
                registry_date: r.registry_date,
                registry_number: r.registry_number,
                notary_office: r.notary_office,
                registry_cost: value_to_decimal(r.registry_cost.as_ref()),
            }),
            consulted_at: Some(Utc::now()),
            query_type: Some(query_type.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Funções puras (testáveis sem rede)
// ---------------------------------------------------------------------------

/// Valores monetários vão ao banco como string com duas casas.
pub(crate) fn format_money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

pub(crate) fn build_registration_body(
    boleto: &Boleto,
    environment: &str,
    pix_key: Option<(&str, &str)>,
) -> Value {
    let mut body = json!({
        "environment": environment,
        "nsuCode": boleto.nsu_code,
        "nsuDate": boleto.nsu_date.format("%Y-%m-%d").to_string(),
        "covenantCode": boleto.covenant_code,
        "bankNumber": boleto.bank_number,
        "clientNumber": boleto.client_number,
        "dueDate": boleto.due_date.format("%Y-%m-%d").to_string(),
        "issueDate": boleto.issue_date.format("%Y-%m-%d").to_string(),
        "nominalValue": format_money(boleto.nominal_value),
        "payer": {
            "name": boleto.payer_name,
            "documentType": boleto.payer_document_type.as_str(),
            "documentNumber": boleto.payer_document_number,
            "address": boleto.payer_address,
            "neighborhood": boleto.payer_neighborhood,
            "city": boleto.payer_city,
            "state": boleto.payer_state,
            "zipCode": boleto.payer_zip_code,
        },
        "documentKind": boleto.document_kind,
        "paymentType": "REGISTRO",
    });

    let Some(obj) = body.as_object_mut() else {
        return body;
    };
    if let Some(fine) = boleto.fine_percentage {
        obj.insert("finePercentage".into(), json!(format_money(fine)));
    }
    if let Some(days) = boleto.fine_quantity_days {
        obj.insert("fineQuantityDays".into(), json!(days.to_string()));
    }
    if let Some(interest) = boleto.interest_percentage {
        obj.insert("interestPercentage".into(), json!(format_money(interest)));
    }
    if let Some(deduction) = boleto.deduction_value {
        obj.insert("deductionValue".into(), json!(format_money(deduction)));
    }
    if let Some(days) = boleto.write_off_quantity_days {
        obj.insert("writeOffQuantityDays".into(), json!(days.to_string()));
    }
    if let Some(messages) = boleto.messages.as_ref().filter(|m| !m.is_empty()) {
        obj.insert("messages".into(), json!(messages));
    }
    if let Some((key_type, dict_key)) = pix_key {
        obj.insert("key".into(), json!({ "type": key_type, "dictKey": dict_key }));
    }
    body
}

/// Aceita tanto a página `{_content: [...]}` quanto um título avulso.
pub(crate) fn parse_status_body(body: &str, query_type: &str) -> Result<StatusResponse, RegistrarError> {
    if body.trim().is_empty() {
        return Ok(StatusResponse::empty(query_type));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| RegistrarError::InvalidResponse(format!("{}: {}", e, truncate_for_log(body))))?;

    let bill = if value.get("_content").is_some() {
        let page: BillPage = serde_json::from_value(value)
            .map_err(|e| RegistrarError::InvalidResponse(e.to_string()))?;
        match page.content.into_iter().next() {
            Some(bill) => bill,
            None => {
                tracing::warn!(query_type, "⚠️ Consulta ao Santander retornou lista vazia");
                return Ok(StatusResponse::empty(query_type));
            }
        }
    } else {
        serde_json::from_value::<BillData>(value).map_err(|e| RegistrarError::InvalidResponse(e.to_string()))?
    };

    Ok(bill.into_status_response(query_type))
}

pub(crate) fn parse_pdf_link(body: &str) -> Result<String, RegistrarError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RegistrarError::InvalidResponse(format!("Resposta do PDF inválida: {}", e)))?;
    value
        .get("link")
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RegistrarError::InvalidResponse("Resposta da API não contém link para download do PDF".into()))
}

pub(crate) fn error_from_response(status: u16, body: &str) -> RegistrarError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = match (parsed.message, parsed.details.and_then(|d| value_to_string(Some(d)))) {
        (Some(m), Some(d)) => format!("{} - {}", m, d),
        (Some(m), None) => m,
        (None, Some(d)) => d,
        (None, None) => truncate_for_log(body).to_string(),
    };

    match status {
        401 | 403 => RegistrarError::Authentication(format!("HTTP {}: {}", status, message)),
        404 => RegistrarError::NotFound(message),
        _ => RegistrarError::Rejected {
            status,
            code: value_to_string(parsed.error_code).unwrap_or_else(|| status.to_string()),
            message,
            trace_id: parsed.trace_id,
        },
    }
}

async fn ensure_success(response: Response) -> Result<Response, RegistrarError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = error_from_response(status.as_u16(), &body);
    tracing::error!(status = status.as_u16(), erro = %err, "❌ Erro na API Santander");
    Err(err)
}

fn value_to_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn value_to_decimal(value: Option<&Value>) -> Option<Decimal> {
    let raw = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_for_log(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
