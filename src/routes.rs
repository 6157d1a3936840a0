// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn router(app_state: AppState) -> Router {
    // Rotas de boletos (todas protegidas pelo token)
    let boleto_routes = Router::new()
        .route(
            "/",
            post(handlers::boletos::create_boleto).get(handlers::boletos::list_boletos),
        )
        .route("/dashboard", get(handlers::dashboard::get_summary))
        .route(
            "/liquidados-por-periodo",
            get(handlers::dashboard::get_liquidados_por_periodo),
        )
        .route(
            "/mapas-faturamento",
            get(handlers::dashboard::get_mapas_faturamento),
        )
        .route("/sincronizar-todos", put(handlers::boletos::sync_all_boletos))
        .route(
            "/contrato/{contrato_id}",
            get(handlers::boletos::list_boletos_by_contrato),
        )
        .route(
            "/status/nosso-numero",
            get(handlers::boletos::status_by_nosso_numero),
        )
        .route("/status/seu-numero", get(handlers::boletos::status_by_seu_numero))
        .route(
            "/status/por-tipo/{bill_id}",
            get(handlers::boletos::status_by_tipo),
        )
        .route(
            "/{id}",
            get(handlers::boletos::get_boleto).delete(handlers::boletos::cancel_boleto),
        )
        .route("/{id}/reenviar", post(handlers::boletos::resubmit_boleto))
        .route("/{id}/sincronizar", put(handlers::boletos::sync_boleto))
        .route("/{id}/status", get(handlers::boletos::get_boleto_status))
        .route("/{id}/eventos", get(handlers::boletos::list_boleto_events))
        .route("/{id}/pdf", get(handlers::boletos::download_boleto_pdf))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/boletos", boleto_routes)
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
