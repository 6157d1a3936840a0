// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{BoletoRepository, BoletoStore},
    registrar::{RegistrarClient, SantanderClient, SimulatedRegistrar},
    services::{
        boleto_service::BoletoService, dashboard_service::DashboardService,
        reconciliation::ReconciliationService,
    },
};

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SANTANDER_URL: &str = "https://trust-open.api.santander.com.br";
const DEFAULT_COVENANT_CODE: &str = "0596794";

/// Credenciais e ajustes da API de cobrança do Santander.
#[derive(Debug, Clone)]
pub struct SantanderConfig {
    pub base_url: String,
    pub workspace_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub environment: String,
    pub certificate_path: Option<String>,
    pub pix_key: Option<String>,
    pub pix_key_type: String,
    pub simulation: bool,
    pub timeout: Duration,
}

/// Parâmetros de negócio dos boletos.
#[derive(Debug, Clone)]
pub struct BoletoSettings {
    pub covenant_code: String,
    pub client_number_prefix: String,
    pub document_kind: String,
    pub sync_concurrency: usize,
    pub recovery_grace: chrono::Duration,
}

impl Default for BoletoSettings {
    fn default() -> Self {
        Self {
            covenant_code: DEFAULT_COVENANT_CODE.to_string(),
            client_number_prefix: "CONT".to_string(),
            document_kind: "DUPLICATA_MERCANTIL".to_string(),
            sync_concurrency: 4,
            recovery_grace: chrono::Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub santander: SantanderConfig,
    pub boletos: BoletoSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let server_addr = optional("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

        let simulation = parse_bool(optional("SANTANDER_MODO_SIMULACAO").as_deref());
        let required = |key: &str| -> anyhow::Result<String> {
            match optional(key) {
                Some(v) => Ok(v),
                None if simulation => Ok(String::new()),
                None => anyhow::bail!("{} deve ser definido (ou ative SANTANDER_MODO_SIMULACAO)", key),
            }
        };

        let santander = SantanderConfig {
            base_url: optional("SANTANDER_BASE_URL").unwrap_or_else(|| DEFAULT_SANTANDER_URL.to_string()),
            workspace_id: required("SANTANDER_WORKSPACE_ID")?,
            client_id: required("SANTANDER_CLIENT_ID")?,
            client_secret: required("SANTANDER_CLIENT_SECRET")?,
            environment: optional("SANTANDER_ENVIRONMENT").unwrap_or_else(|| "PRODUCAO".to_string()),
            certificate_path: optional("SANTANDER_CERTIFICATE_PATH"),
            pix_key: optional("SANTANDER_PIX_KEY"),
            pix_key_type: optional("SANTANDER_PIX_KEY_TYPE").unwrap_or_else(|| "CNPJ".to_string()),
            simulation,
            timeout: Duration::from_secs(parse_number(
                "SANTANDER_TIMEOUT_SECS",
                optional("SANTANDER_TIMEOUT_SECS").as_deref(),
                30,
            )?),
        };

        let defaults = BoletoSettings::default();
        let boletos = BoletoSettings {
            covenant_code: optional("SANTANDER_COVENANT_CODE").unwrap_or(defaults.covenant_code),
            client_number_prefix: optional("BOLETO_CLIENT_NUMBER_PREFIX")
                .unwrap_or(defaults.client_number_prefix),
            document_kind: defaults.document_kind,
            sync_concurrency: parse_number(
                "BOLETO_SYNC_CONCURRENCY",
                optional("BOLETO_SYNC_CONCURRENCY").as_deref(),
                defaults.sync_concurrency,
            )?
            .max(1),
            recovery_grace: chrono::Duration::minutes(parse_number(
                "BOLETO_RECOVERY_GRACE_MINUTES",
                optional("BOLETO_RECOVERY_GRACE_MINUTES").as_deref(),
                10,
            )?),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            server_addr,
            santander,
            boletos,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("sim") | Some("yes")
    )
}

pub(crate) fn parse_number<T>(key: &str, raw: Option<&str>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} inválido ({}): {}", key, v, e)),
    }
}

pub async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .context("Falha ao conectar ao banco de dados")?;

    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
    Ok(db_pool)
}

#[derive(Clone)]
pub struct AppState {
    pub jwt_secret: String,
    pub boleto_service: BoletoService,
    pub reconciliation_service: ReconciliationService,
    pub dashboard_service: DashboardService,
}

impl AppState {
    /// Monta o gráfico de dependências de produção (Postgres + Santander ou simulação).
    pub fn new(config: &Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let store: Arc<dyn BoletoStore> = Arc::new(BoletoRepository::new(db_pool));

        let registrar: Arc<dyn RegistrarClient> = if config.santander.simulation {
            Arc::new(SimulatedRegistrar::new())
        } else {
            let client = SantanderClient::new(config.santander.clone())
                .context("Falha ao montar o cliente da API Santander")?;
            tracing::info!(base_url = %config.santander.base_url, "✅ Cliente da API Santander configurado");
            Arc::new(client)
        };

        Ok(Self::from_parts(
            config.jwt_secret.clone(),
            store,
            registrar,
            config.boletos.clone(),
        ))
    }

    /// Monta o estado a partir de implementações já construídas.
    pub fn from_parts(
        jwt_secret: String,
        store: Arc<dyn BoletoStore>,
        registrar: Arc<dyn RegistrarClient>,
        settings: BoletoSettings,
    ) -> Self {
        let reconciliation_service =
            ReconciliationService::new(store.clone(), registrar.clone(), settings.clone());
        let boleto_service = BoletoService::new(store.clone(), registrar, settings);
        let dashboard_service = DashboardService::new(store);

        Self {
            jwt_secret,
            boleto_service,
            reconciliation_service,
            dashboard_service,
        }
    }
}
