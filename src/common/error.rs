// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    // Operação incompatível com o estado atual do boleto (ou do contrato)
    #[error("{0}")]
    InvalidState(String),

    #[error("Tipo de consulta inválido: {0}")]
    InvalidQueryType(String),

    // Colisão de NSU ou nosso número na constraint UNIQUE
    #[error("Identificador duplicado: {0}")]
    DuplicateIdentifier(String),

    // Registro alterado por outra operação entre a leitura e a gravação
    #[error("{0}")]
    Conflict(String),

    #[error("Erro na API do banco ({code}): {message}")]
    Registrar { code: String, message: String },

    #[error("Timeout na comunicação com o banco: {0}")]
    RegistrarTimeout(String),

    #[error("Falha de autenticação com o banco: {0}")]
    RegistrarAuth(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidState(_)
            | AppError::InvalidQueryType(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateIdentifier(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Registrar { .. } | AppError::RegistrarAuth(_) => StatusCode::BAD_GATEWAY,
            AppError::RegistrarTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Identificador estável do tipo de erro, exposto no campo `kind` da resposta.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidQueryType(_) => "INVALID_QUERY_TYPE",
            AppError::DuplicateIdentifier(_) => "DUPLICATE_IDENTIFIER",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Registrar { .. } => "REGISTRAR_ERROR",
            AppError::RegistrarTimeout(_) => "REGISTRAR_TIMEOUT",
            AppError::RegistrarAuth(_) => "REGISTRAR_AUTH",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        let (message, details): (String, Value) = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => m.to_string(),
                            None => e.code.to_string(),
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                ("Um ou mais campos são inválidos.".to_string(), json!(details))
            }
            AppError::NotFound(msg) | AppError::InvalidState(msg) | AppError::Conflict(msg) => {
                (msg.clone(), Value::Null)
            }
            AppError::InvalidQueryType(allowed) => (
                "Tipo de consulta inválido.".to_string(),
                json!(format!("Valores permitidos: {}", allowed)),
            ),
            AppError::DuplicateIdentifier(_) => (
                "Não foi possível gerar identificadores únicos para o boleto.".to_string(),
                json!(self.to_string()),
            ),
            AppError::Registrar { code, message } => (
                "Erro ao comunicar com a API do banco.".to_string(),
                json!({ "code": code, "message": message }),
            ),
            AppError::RegistrarTimeout(detail) => (
                "Timeout na comunicação com o banco. Tente novamente.".to_string(),
                json!(detail),
            ),
            AppError::RegistrarAuth(detail) => (
                "Erro de autenticação com o banco. Verifique as credenciais.".to_string(),
                json!(detail),
            ),
            AppError::InvalidToken => (
                "Token de autenticação inválido ou ausente.".to_string(),
                Value::Null,
            ),

            // Erros de banco e internos viram 500 e só o log leva o detalhe.
            e @ (AppError::DatabaseError(_) | AppError::InternalServerError(_)) => {
                tracing::error!(erro = ?e, "Erro Interno do Servidor: {}", e);
                ("Ocorreu um erro inesperado.".to_string(), Value::Null)
            }
        };

        if status.is_server_error() && !matches!(self, AppError::DatabaseError(_) | AppError::InternalServerError(_)) {
            tracing::warn!(kind, "{}", self);
        }

        let body = Json(json!({
            "error": message,
            "details": details,
            "kind": kind,
        }));
        (status, body).into_response()
    }
}
