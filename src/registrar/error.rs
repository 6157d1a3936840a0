// src/registrar/error.rs

use thiserror::Error;

use crate::common::error::AppError;

// Códigos do banco são gravados com no máximo 10 caracteres
const ERROR_CODE_MAX_LEN: usize = 10;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrarError {
    /// O banco respondeu com status não-2xx.
    #[error("Banco recusou a requisição (HTTP {status}, {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
        trace_id: Option<String>,
    },

    #[error("Registro não encontrado no banco: {0}")]
    NotFound(String),

    #[error("Timeout na comunicação com o banco: {0}")]
    Timeout(String),

    #[error("Falha de autenticação com o banco: {0}")]
    Authentication(String),

    #[error("Falha de comunicação com o banco: {0}")]
    Transport(String),

    #[error("Resposta inválida do banco: {0}")]
    InvalidResponse(String),
}

impl RegistrarError {
    /// Código curto gravado em `error_code` quando o registro falha.
    pub fn code(&self) -> String {
        let code = match self {
            RegistrarError::Rejected { code, .. } => code.as_str(),
            RegistrarError::NotFound(_) => "NOT_FOUND",
            RegistrarError::Timeout(_) => "TIMEOUT",
            RegistrarError::Authentication(_) => "AUTH_ERROR",
            RegistrarError::Transport(_) | RegistrarError::InvalidResponse(_) => "API_ERROR",
        };
        code.chars().take(ERROR_CODE_MAX_LEN).collect()
    }

    pub fn trace_id(&self) -> Option<&str> {
        match self {
            RegistrarError::Rejected { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistrarError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RegistrarError::Timeout(e.to_string())
        } else if e.is_decode() {
            RegistrarError::InvalidResponse(e.to_string())
        } else {
            RegistrarError::Transport(e.to_string())
        }
    }
}

impl From<RegistrarError> for AppError {
    fn from(e: RegistrarError) -> Self {
        match e {
            RegistrarError::NotFound(msg) => AppError::NotFound(msg),
            RegistrarError::Timeout(msg) => AppError::RegistrarTimeout(msg),
            RegistrarError::Authentication(msg) => AppError::RegistrarAuth(msg),
            RegistrarError::Rejected { code, message, .. } => AppError::Registrar { code, message },
            other @ (RegistrarError::Transport(_) | RegistrarError::InvalidResponse(_)) => {
                AppError::Registrar { code: other.code(), message: other.to_string() }
            }
        }
    }
}
