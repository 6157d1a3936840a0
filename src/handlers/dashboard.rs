// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::dashboard::{DashboardSummary, LiquidadosPorPeriodo, MapaCliente},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodoQuery {
    /// dia, semana ou mes (padrão: semana)
    pub periodo: Option<String>,
}

// GET /api/boletos/dashboard
#[utoipa::path(
    get,
    path = "/api/boletos/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Totais por status e valores registrados/liquidados", body = DashboardSummary),
        (status = 401, description = "Não autorizado")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.dashboard_service.summary().await?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/boletos/liquidados-por-periodo
#[utoipa::path(
    get,
    path = "/api/boletos/liquidados-por-periodo",
    tag = "Dashboard",
    params(PeriodoQuery),
    responses(
        (status = 200, description = "Série diária de liquidações", body = LiquidadosPorPeriodo),
        (status = 401, description = "Não autorizado")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn get_liquidados_por_periodo(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PeriodoQuery>,
) -> Result<impl IntoResponse, AppError> {
    let serie = app_state
        .dashboard_service
        .liquidados_por_periodo(query.periodo.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(serie)))
}

// GET /api/boletos/mapas-faturamento
#[utoipa::path(
    get,
    path = "/api/boletos/mapas-faturamento",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Boletos pagos e a pagar agrupados por cliente", body = Vec<MapaCliente>),
        (status = 401, description = "Não autorizado")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn get_mapas_faturamento(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let mapas = app_state.dashboard_service.mapas_faturamento().await?;

    Ok((StatusCode::OK, Json(mapas)))
}
