// src/services/identifiers.rs
//
// Geração dos identificadores do boleto. Nada aqui consulta o banco de dados:
// colisões de NSU/nosso número são barradas pela constraint UNIQUE e o
// orquestrador regenera.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::services::sanitizer::digits_only;

pub const NSU_CODE_MAX_LEN: usize = 13;
pub const BANK_NUMBER_MAX_LEN: usize = 13;
pub const CLIENT_NUMBER_MAX_LEN: usize = 15;

/// Sufixo aleatório de 3 dígitos (100..=999).
pub fn random_suffix() -> u32 {
    100 + (Uuid::new_v4().as_u128() % 900) as u32
}

pub fn next_nsu_code() -> String {
    nsu_code_at(Utc::now(), random_suffix())
}

pub fn next_bank_number() -> String {
    bank_number_at(Utc::now(), random_suffix())
}

/// Milissegundos (10 dígitos menos significativos) + sufixo.
pub fn nsu_code_at(now: DateTime<Utc>, suffix: u32) -> String {
    let millis = now.timestamp_millis().rem_euclid(10_000_000_000);
    format!("{:010}{:03}", millis, suffix % 1000)
        .chars()
        .take(NSU_CODE_MAX_LEN)
        .collect()
}

/// Segundos Unix + sufixo, no máximo 13 caracteres.
pub fn bank_number_at(now: DateTime<Utc>, suffix: u32) -> String {
    format!("{}{:03}", now.timestamp(), suffix % 1000)
        .chars()
        .take(BANK_NUMBER_MAX_LEN)
        .collect()
}

/// Próximo "seu número" a partir do último emitido (`CONT148` -> `CONT149`).
pub fn next_client_number(prefix: &str, last: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(last) = last else {
        return format!("{}1", prefix);
    };

    let sem_prefixo = last.strip_prefix(prefix).unwrap_or(last);
    match digits_only(sem_prefixo).parse::<u64>() {
        Ok(n) => limit(format!("{}{}", prefix, n.saturating_add(1))),
        Err(_) => {
            tracing::warn!(ultimo = last, "Último número de cliente não numérico, usando fallback");
            client_number_fallback(prefix, now)
        }
    }
}

/// Valor derivado do relógio quando não há sequência utilizável.
pub fn client_number_fallback(prefix: &str, now: DateTime<Utc>) -> String {
    let secs: String = now.timestamp().to_string().chars().skip(5).collect();
    limit(format!("{}{}", prefix, secs))
}

/// Número informado pelo chamador: sem hífens e sem espaços nas pontas.
pub fn normalize_client_number(input: &str) -> String {
    limit(input.trim().replace('-', ""))
}

fn limit(value: String) -> String {
    value.chars().take(CLIENT_NUMBER_MAX_LEN).collect()
}
