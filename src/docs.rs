// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::registrar;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Boletos ---
        handlers::boletos::create_boleto,
        handlers::boletos::resubmit_boleto,
        handlers::boletos::cancel_boleto,
        handlers::boletos::list_boletos,
        handlers::boletos::get_boleto,
        handlers::boletos::list_boletos_by_contrato,
        handlers::boletos::list_boleto_events,
        handlers::boletos::download_boleto_pdf,

        // --- Sincronização ---
        handlers::boletos::sync_boleto,
        handlers::boletos::sync_all_boletos,
        handlers::boletos::get_boleto_status,
        handlers::boletos::status_by_nosso_numero,
        handlers::boletos::status_by_seu_numero,
        handlers::boletos::status_by_tipo,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
        handlers::dashboard::get_liquidados_por_periodo,
        handlers::dashboard::get_mapas_faturamento,
    ),
    components(
        schemas(
            // --- Boletos ---
            models::boleto::BoletoStatus,
            models::boleto::DocumentType,
            models::boleto::TipoEvento,
            models::boleto::Boleto,
            models::boleto::BoletoEvento,
            models::boleto::StatusChange,
            models::boleto::SyncFailure,
            models::boleto::BulkSyncReport,

            // --- Banco ---
            registrar::StatusResponse,
            registrar::PayerInfo,
            registrar::SettlementInfo,
            registrar::RegistryInfo,

            // --- Dashboard ---
            models::dashboard::DashboardSummary,
            models::dashboard::LiquidacaoDia,
            models::dashboard::LiquidadosPorPeriodo,
            models::dashboard::MapaCliente,
            models::dashboard::BoletoMapa,
            models::contrato::TipoPessoa,

            // --- Payloads ---
            handlers::boletos::CreateBoletoPayload,
        )
    ),
    tags(
        (name = "Boletos", description = "Emissão, cancelamento e consulta de boletos"),
        (name = "Sincronização", description = "Reconciliação do status com o banco"),
        (name = "Dashboard", description = "Indicadores e Gráficos de Cobrança")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
