// src/handlers/boletos.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::boleto::{Boleto, BoletoEvento, BulkSyncReport, DadosEmissao},
    registrar::StatusResponse,
    services::reconciliation::required,
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_percentuais"))]
pub struct CreateBoletoPayload {
    #[schema(example = 7)]
    pub contrato_id: i64,

    #[schema(example = "2026-11-16")]
    pub due_date: NaiveDate,

    // Padrão: hoje
    pub issue_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_valor_nominal"))]
    #[schema(example = "1500.00")]
    pub nominal_value: Decimal,

    #[validate(length(max = 15, message = "O seu número deve ter no máximo 15 caracteres"))]
    #[schema(example = "CONT149")]
    pub client_number: Option<String>,

    #[schema(example = "2.00")]
    pub fine_percentage: Option<Decimal>,

    #[validate(range(min = 1, max = 99, message = "Dias de multa devem estar entre 1 e 99"))]
    pub fine_quantity_days: Option<i32>,

    #[schema(example = "1.00")]
    pub interest_percentage: Option<Decimal>,

    pub deduction_value: Option<Decimal>,

    #[validate(range(min = 1, max = 99, message = "Dias para baixa devem estar entre 1 e 99"))]
    pub write_off_quantity_days: Option<i32>,

    pub messages: Option<Vec<String>>,
}

fn validate_valor_nominal(valor: &Decimal) -> Result<(), ValidationError> {
    if *valor < dec!(0.01) || *valor > dec!(999999999.99) {
        let mut erro = ValidationError::new("range");
        erro.message = Some("O valor nominal deve estar entre 0,01 e 999.999.999,99".into());
        return Err(erro);
    }
    Ok(())
}

fn validate_percentuais(payload: &CreateBoletoPayload) -> Result<(), ValidationError> {
    let fora_da_faixa = |v: Option<Decimal>| v.is_some_and(|v| v < Decimal::ZERO || v > dec!(99.99));

    if fora_da_faixa(payload.fine_percentage) {
        let mut erro = ValidationError::new("fine_percentage");
        erro.message = Some("O percentual de multa deve estar entre 0 e 99,99".into());
        return Err(erro);
    }
    if fora_da_faixa(payload.interest_percentage) {
        let mut erro = ValidationError::new("interest_percentage");
        erro.message = Some("O percentual de juros deve estar entre 0 e 99,99".into());
        return Err(erro);
    }
    if payload.deduction_value.is_some_and(|v| v < Decimal::ZERO) {
        let mut erro = ValidationError::new("deduction_value");
        erro.message = Some("O valor de abatimento não pode ser negativo".into());
        return Err(erro);
    }
    Ok(())
}

impl From<CreateBoletoPayload> for DadosEmissao {
    fn from(p: CreateBoletoPayload) -> Self {
        Self {
            contrato_id: p.contrato_id,
            due_date: p.due_date,
            issue_date: p.issue_date,
            nominal_value: p.nominal_value,
            client_number: p.client_number,
            fine_percentage: p.fine_percentage,
            fine_quantity_days: p.fine_quantity_days,
            interest_percentage: p.interest_percentage,
            deduction_value: p.deduction_value,
            write_off_quantity_days: p.write_off_quantity_days,
            messages: p.messages,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NossoNumeroQuery {
    /// Código do beneficiário (padrão: convênio configurado)
    pub beneficiary_code: Option<String>,
    /// Obrigatório
    #[param(example = "1718042538417")]
    pub bank_number: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SeuNumeroQuery {
    pub beneficiary_code: Option<String>,
    /// Obrigatório
    #[param(example = "CONT149")]
    pub client_number: Option<String>,
    /// Obrigatório, no formato AAAA-MM-DD
    #[param(example = "2026-11-16")]
    pub due_date: Option<String>,
    /// Obrigatório
    #[param(example = "1500.00")]
    pub nominal_value: Option<String>,
}

// Os parâmetros chegam como texto para que ausência e formato inválido
// virem o mesmo corpo de erro das demais rotas.
impl SeuNumeroQuery {
    fn due_date(&self) -> Result<NaiveDate, AppError> {
        let raw = required("dueDate", self.due_date.as_deref().unwrap_or_default())?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::InvalidState("O parâmetro dueDate deve estar no formato AAAA-MM-DD".to_string())
        })
    }

    fn nominal_value(&self) -> Result<Decimal, AppError> {
        let raw = required("nominalValue", self.nominal_value.as_deref().unwrap_or_default())?;
        raw.parse::<Decimal>().map_err(|_| {
            AppError::InvalidState("O parâmetro nominalValue deve ser um valor decimal (ex.: 1500.00)".to_string())
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TipoConsultaQuery {
    /// default, duplicate, bankslip, settlement ou registry
    pub tipo_consulta: Option<String>,
}

// =============================================================================
//  CICLO DE VIDA
// =============================================================================

// POST /api/boletos
#[utoipa::path(
    post,
    path = "/api/boletos",
    tag = "Boletos",
    request_body = CreateBoletoPayload,
    responses(
        (status = 201, description = "Boleto criado; o status indica se o banco registrou (REGISTRADO) ou recusou (ERRO)", body = Boleto),
        (status = 400, description = "Dados inválidos ou contrato sem cliente"),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_boleto(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateBoletoPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let boleto = app_state
        .boleto_service
        .create(&user.0, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(boleto)))
}

// POST /api/boletos/{id}/reenviar
#[utoipa::path(
    post,
    path = "/api/boletos/{id}/reenviar",
    tag = "Boletos",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "Resultado do reenvio (REGISTRADO ou ERRO)", body = Boleto),
        (status = 400, description = "Boleto não está em ERRO"),
        (status = 404, description = "Boleto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn resubmit_boleto(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let boleto = app_state.boleto_service.resubmit(&user.0, id).await?;
    Ok((StatusCode::OK, Json(boleto)))
}

// DELETE /api/boletos/{id}
#[utoipa::path(
    delete,
    path = "/api/boletos/{id}",
    tag = "Boletos",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 204, description = "Boleto cancelado"),
        (status = 400, description = "Boleto liquidado não pode ser cancelado"),
        (status = 404, description = "Boleto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_boleto(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.boleto_service.cancel(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  LEITURAS
// =============================================================================

// GET /api/boletos
#[utoipa::path(
    get,
    path = "/api/boletos",
    tag = "Boletos",
    responses((status = 200, description = "Boletos ativos", body = Vec<Boleto>)),
    security(("api_jwt" = []))
)]
pub async fn list_boletos(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let boletos = app_state.boleto_service.list_active().await?;
    Ok((StatusCode::OK, Json(boletos)))
}

// GET /api/boletos/{id}
#[utoipa::path(
    get,
    path = "/api/boletos/{id}",
    tag = "Boletos",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "Boleto", body = Boleto),
        (status = 404, description = "Boleto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_boleto(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let boleto = app_state.boleto_service.get(id).await?;
    Ok((StatusCode::OK, Json(boleto)))
}

// GET /api/boletos/contrato/{contratoId}
#[utoipa::path(
    get,
    path = "/api/boletos/contrato/{contratoId}",
    tag = "Boletos",
    params(("contratoId" = i64, Path, description = "ID do contrato")),
    responses((status = 200, description = "Boletos do contrato", body = Vec<Boleto>)),
    security(("api_jwt" = []))
)]
pub async fn list_boletos_by_contrato(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(contrato_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let boletos = app_state.boleto_service.list_by_contrato(contrato_id).await?;
    Ok((StatusCode::OK, Json(boletos)))
}

// GET /api/boletos/{id}/eventos
#[utoipa::path(
    get,
    path = "/api/boletos/{id}/eventos",
    tag = "Boletos",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "Trilha de auditoria do boleto", body = Vec<BoletoEvento>),
        (status = 404, description = "Boleto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_boleto_events(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let eventos = app_state.boleto_service.events(id).await?;
    Ok((StatusCode::OK, Json(eventos)))
}

// GET /api/boletos/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/boletos/{id}/pdf",
    tag = "Boletos",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "PDF do boleto", content_type = "application/pdf"),
        (status = 400, description = "Boleto sem nosso número"),
        (status = 404, description = "Boleto ou PDF não encontrado"),
        (status = 502, description = "Falha na API do banco"),
        (status = 504, description = "Timeout ao baixar o PDF")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_boleto_pdf(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let pdf = app_state.boleto_service.download_pdf(id).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", pdf.file_name)),
    ];

    Ok((headers, pdf.bytes).into_response())
}

// =============================================================================
//  SINCRONIZAÇÃO E CONSULTAS AO BANCO
// =============================================================================

// PUT /api/boletos/{id}/sincronizar
#[utoipa::path(
    put,
    path = "/api/boletos/{id}/sincronizar",
    tag = "Sincronização",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "Boleto após a sincronização", body = Boleto),
        (status = 400, description = "Boleto pendente não pode ser sincronizado"),
        (status = 404, description = "Boleto não encontrado"),
        (status = 502, description = "Falha na API do banco")
    ),
    security(("api_jwt" = []))
)]
pub async fn sync_boleto(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let boleto = app_state.reconciliation_service.sync_one(&user.0, id).await?;
    Ok((StatusCode::OK, Json(boleto)))
}

// PUT /api/boletos/sincronizar-todos
#[utoipa::path(
    put,
    path = "/api/boletos/sincronizar-todos",
    tag = "Sincronização",
    responses((status = 200, description = "Resumo da sincronização em lote", body = BulkSyncReport)),
    security(("api_jwt" = []))
)]
pub async fn sync_all_boletos(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.reconciliation_service.sync_all(&user.0).await?;
    Ok((StatusCode::OK, Json(report)))
}

// GET /api/boletos/{id}/status
#[utoipa::path(
    get,
    path = "/api/boletos/{id}/status",
    tag = "Sincronização",
    params(("id" = i64, Path, description = "ID do boleto")),
    responses(
        (status = 200, description = "Status do boleto no banco", body = StatusResponse),
        (status = 404, description = "Boleto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_boleto_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = app_state.reconciliation_service.consultar_status(&user.0, id).await?;
    Ok((StatusCode::OK, Json(status)))
}

// GET /api/boletos/status/nosso-numero
#[utoipa::path(
    get,
    path = "/api/boletos/status/nosso-numero",
    tag = "Sincronização",
    params(NossoNumeroQuery),
    responses(
        (status = 200, description = "Status no banco pelo nosso número", body = StatusResponse),
        (status = 400, description = "Parâmetro obrigatório ausente ou inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn status_by_nosso_numero(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<NossoNumeroQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = app_state
        .reconciliation_service
        .by_nosso_numero(
            query.beneficiary_code.as_deref(),
            query.bank_number.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok((StatusCode::OK, Json(status)))
}

// GET /api/boletos/status/seu-numero
#[utoipa::path(
    get,
    path = "/api/boletos/status/seu-numero",
    tag = "Sincronização",
    params(SeuNumeroQuery),
    responses(
        (status = 200, description = "Status no banco pelo seu número", body = StatusResponse),
        (status = 400, description = "Parâmetro obrigatório ausente ou inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn status_by_seu_numero(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<SeuNumeroQuery>,
) -> Result<impl IntoResponse, AppError> {
    let due_date = query.due_date()?;
    let nominal_value = query.nominal_value()?;
    let status = app_state
        .reconciliation_service
        .by_seu_numero(
            query.beneficiary_code.as_deref(),
            query.client_number.as_deref().unwrap_or_default(),
            due_date,
            nominal_value,
        )
        .await?;
    Ok((StatusCode::OK, Json(status)))
}

// GET /api/boletos/status/por-tipo/{billId}
#[utoipa::path(
    get,
    path = "/api/boletos/status/por-tipo/{billId}",
    tag = "Sincronização",
    params(
        ("billId" = String, Path, description = "Identificador do título no banco (convênio.nosso número)"),
        TipoConsultaQuery
    ),
    responses(
        (status = 200, description = "Status no banco pelo tipo de consulta", body = StatusResponse),
        (status = 400, description = "Tipo de consulta inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn status_by_tipo(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(bill_id): Path<String>,
    Query(query): Query<TipoConsultaQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = app_state
        .reconciliation_service
        .by_tipo(&bill_id, query.tipo_consulta.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(status)))
}
