//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crm_boletos::{
    config::{connect_database, AppState, Config},
    router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG controla o nível; padrão info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let db_pool = connect_database(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app_state = AppState::new(&config, db_pool)?;

    // Intenções PENDENTE que ficaram para trás (queda no meio da emissão)
    let reconciliation = app_state.reconciliation_service.clone();
    let grace = config.boletos.recovery_grace;
    tokio::spawn(async move {
        if let Err(e) = reconciliation.recover_stale_pending(grace).await {
            tracing::error!("❌ Falha na recuperação de boletos pendentes: {}", e);
        }
    });

    let app = router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&config.server_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
