// tests/http_api.rs

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{app_state, boleto_fixture, contrato_juridico, FakeRegistrar, MemoryStore, JWT_SECRET};
use crm_boletos::{
    models::{auth::Claims, boleto::BoletoStatus},
    router,
};

fn token() -> String {
    let agora = chrono::Utc::now().timestamp() as usize;
    let claims = Claims { sub: "42".into(), iat: agora, exp: agora + 3600 };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_ref())).unwrap()
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token()));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let app = router(app_state(MemoryStore::new(), FakeRegistrar::new()));
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn boleto_routes_require_token() {
    let app = router(app_state(MemoryStore::new(), FakeRegistrar::new()));

    let req = Request::builder().uri("/api/boletos").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "INVALID_TOKEN");

    let req = Request::builder()
        .uri("/api/boletos")
        .header(header::AUTHORIZATION, "Bearer token-invalido")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_returns_201_with_registered_boleto() {
    let store = MemoryStore::new();
    store.add_contrato(contrato_juridico());
    let app = router(app_state(store.clone(), FakeRegistrar::new()));

    let payload = json!({
        "contratoId": 7,
        "dueDate": "2026-11-16",
        "nominalValue": "1500.00",
        "finePercentage": "2.00",
        "fineQuantityDays": 5
    });
    let (status, body) = send(app, request(Method::POST, "/api/boletos", Some(payload))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "REGISTRADO");
    assert_eq!(body["payerName"], "Joao D Avila E Cia");
    assert_eq!(body["nominalValue"], "1500.00");
    assert_eq!(body["criadoPor"], 42);
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn invalid_payload_returns_field_details() {
    let store = MemoryStore::new();
    store.add_contrato(contrato_juridico());
    let app = router(app_state(store.clone(), FakeRegistrar::new()));

    let payload = json!({
        "contratoId": 7,
        "dueDate": "2026-11-16",
        "nominalValue": "0.00",
        "fineQuantityDays": 120
    });
    let (status, body) = send(app, request(Method::POST, "/api/boletos", Some(payload))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "VALIDATION");
    assert!(body["details"]["nominal_value"].is_array());
    assert!(body["details"]["fine_quantity_days"].is_array());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn unknown_boleto_is_404() {
    let app = router(app_state(MemoryStore::new(), FakeRegistrar::new()));
    let (status, body) = send(app, request(Method::GET, "/api/boletos/999", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn cancelling_liquidated_boleto_is_400() {
    let store = MemoryStore::new();
    let liquidado = store.seed(boleto_fixture(BoletoStatus::Liquidado));
    let registrado = store.seed(boleto_fixture(BoletoStatus::Registrado));
    let app = router(app_state(store.clone(), FakeRegistrar::new()));

    let uri = format!("/api/boletos/{}", liquidado.id);
    let (status, body) = send(app.clone(), request(Method::DELETE, &uri, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_STATE");
    assert_eq!(body["error"], "Não é possível cancelar um boleto liquidado");

    let uri = format!("/api/boletos/{}", registrado.id);
    let (status, _) = send(app, request(Method::DELETE, &uri, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.boleto(registrado.id).status, BoletoStatus::Cancelado);
}

#[tokio::test]
async fn bulk_sync_with_no_candidates_returns_zeros() {
    let registrar = FakeRegistrar::new();
    let app = router(app_state(MemoryStore::new(), registrar.clone()));

    let (status, body) = send(app, request(Method::PUT, "/api/boletos/sincronizar-todos", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["sucesso"], 0);
    assert_eq!(body["erros"], 0);
    assert_eq!(body["atualizados"], json!([]));
    assert_eq!(body["errosLista"], json!([]));
    assert_eq!(registrar.calls(), (0, 0, 0));
}

#[tokio::test]
async fn syncing_pending_boleto_is_400() {
    let store = MemoryStore::new();
    let pendente = store.seed(boleto_fixture(BoletoStatus::Pendente));
    let app = router(app_state(store, FakeRegistrar::new()));

    let uri = format!("/api/boletos/{}/sincronizar", pendente.id);
    let (status, body) = send(app, request(Method::PUT, &uri, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_STATE");
}

#[tokio::test]
async fn invalid_query_type_lists_allowed_values() {
    let app = router(app_state(MemoryStore::new(), FakeRegistrar::new()));

    let (status, body) = send(
        app,
        request(Method::GET, "/api/boletos/status/por-tipo/0596794.123?tipoConsulta=cartorio", None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_QUERY_TYPE");
    assert!(body["details"].as_str().unwrap().contains("default, duplicate, bankslip, settlement, registry"));
}

#[tokio::test]
async fn registrar_timeout_maps_to_504() {
    let store = MemoryStore::new();
    let registrado = store.seed(boleto_fixture(BoletoStatus::Registrado));
    let registrar = FakeRegistrar::new();
    registrar.on_query(Err(crm_boletos::registrar::RegistrarError::Timeout("30s".into())));
    let app = router(app_state(store, registrar));

    let uri = format!("/api/boletos/{}/status", registrado.id);
    let (status, body) = send(app, request(Method::GET, &uri, None)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["kind"], "REGISTRAR_TIMEOUT");
}

#[tokio::test]
async fn dashboard_counts_by_status() {
    let store = MemoryStore::new();
    store.seed(boleto_fixture(BoletoStatus::Registrado));
    store.seed(boleto_fixture(BoletoStatus::Registrado));
    let mut liquidado = boleto_fixture(BoletoStatus::Liquidado);
    liquidado.settlement_date = Some(chrono::Local::now().date_naive());
    store.seed(liquidado);
    let app = router(app_state(store, FakeRegistrar::new()));

    let (status, body) = send(app.clone(), request(Method::GET, "/api/boletos/dashboard", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalBoletos"], 3);
    assert_eq!(body["registrados"], 2);
    assert_eq!(body["liquidados"], 1);
    assert_eq!(body["valorTotalRegistrado"], "300.00");
    assert_eq!(body["valorTotalLiquidado"], "150.00");
    assert_eq!(body["boletosHoje"], 3);

    let (status, body) = send(
        app,
        request(Method::GET, "/api/boletos/liquidados-por-periodo?periodo=dia", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["periodo"], "dia");
    assert_eq!(body["totalDias"], 1);
    assert_eq!(body["quantidadeTotal"], 1);
    assert_eq!(body["dados"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pdf_is_served_as_attachment() {
    let store = MemoryStore::new();
    let boleto = store.seed(boleto_fixture(BoletoStatus::Registrado));
    let app = router(app_state(store, FakeRegistrar::new()));

    let uri = format!("/api/boletos/{}/pdf", boleto.id);
    let response = app.oneshot(request(Method::GET, &uri, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with(&format!("attachment; filename=\"Boleto_{}_Maria_Souza_", boleto.id)));
}

#[tokio::test]
async fn status_lookups_report_missing_params_as_json() {
    let registrar = FakeRegistrar::new();
    let app = router(app_state(MemoryStore::new(), registrar.clone()));

    let (status, body) = send(
        app.clone(),
        request(Method::GET, "/api/boletos/status/seu-numero?clientNumber=CONT149&nominalValue=10.00", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_STATE");
    assert_eq!(body["error"], "O parâmetro dueDate é obrigatório");

    let (status, body) = send(
        app.clone(),
        request(Method::GET, "/api/boletos/status/seu-numero?dueDate=2026-11-16&nominalValue=abc", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_STATE");

    let (status, body) = send(app.clone(), request(Method::GET, "/api/boletos/status/nosso-numero", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "O parâmetro bankNumber é obrigatório");
    assert_eq!(registrar.calls().1, 0);

    let (status, _) = send(
        app,
        request(
            Method::GET,
            "/api/boletos/status/seu-numero?clientNumber=CONT149&dueDate=2026-11-16&nominalValue=1500.00",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registrar.calls().1, 1);
}

#[tokio::test]
async fn billing_maps_group_boletos_by_client() {
    let store = MemoryStore::new();
    store.add_contrato(contrato_juridico());
    let hoje = chrono::Local::now().date_naive();

    let mut pago = boleto_fixture(BoletoStatus::Liquidado);
    pago.settlement_date = Some(hoje);
    store.seed(pago);
    let mut atrasado = boleto_fixture(BoletoStatus::Vencido);
    atrasado.due_date = hoje - chrono::Duration::days(3);
    let atrasado = store.seed(atrasado);
    let em_dia = store.seed(boleto_fixture(BoletoStatus::Registrado));
    store.seed(boleto_fixture(BoletoStatus::Cancelado));
    let app = router(app_state(store, FakeRegistrar::new()));

    let (status, body) = send(app, request(Method::GET, "/api/boletos/mapas-faturamento", None)).await;

    assert_eq!(status, StatusCode::OK);
    let mapas = body.as_array().unwrap();
    assert_eq!(mapas.len(), 1);
    let cliente = &mapas[0];
    assert_eq!(cliente["clienteId"], 3);
    assert_eq!(cliente["nome"], "Maria Souza");
    assert_eq!(cliente["tipoPessoa"], "Juridica");
    assert_eq!(cliente["totalBoletos"], 4);
    assert_eq!(cliente["totalPagos"], 1);
    assert_eq!(cliente["totalAPagar"], 2);
    assert_eq!(cliente["valorTotalPago"], "150.00");
    assert_eq!(cliente["valorTotalAPagar"], "300.00");
    assert_eq!(
        cliente["boletosPagos"][0]["dataPagamento"],
        hoje.format("%d/%m/%Y").to_string()
    );

    let a_pagar = cliente["boletosAPagar"].as_array().unwrap();
    assert_eq!(a_pagar[0]["id"], atrasado.id);
    assert_eq!(a_pagar[0]["vencido"], true);
    assert_eq!(a_pagar[1]["id"], em_dia.id);
    assert_eq!(a_pagar[1]["vencido"], false);
    assert!(a_pagar[1].get("dataPagamento").is_none());
}
