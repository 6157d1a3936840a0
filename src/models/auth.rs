// src/models/auth.rs

use serde::{Deserialize, Serialize};

// Claims do token emitido pelo serviço de login
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // ID numérico do usuário
    pub exp: usize,
    pub iat: usize,
}

/// Identidade de quem está chamando, resolvida uma vez pelo `auth_guard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub usuario_id: Option<i64>,
}

impl Caller {
    pub fn usuario(id: i64) -> Self {
        Self { usuario_id: Some(id) }
    }

    /// Rotinas internas (recuperação na inicialização) sem usuário humano.
    pub fn sistema() -> Self {
        Self { usuario_id: None }
    }
}
