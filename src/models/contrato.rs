// src/models/contrato.rs
//
// Visão somente-leitura de contrato/cliente usada para montar o pagador.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::boleto::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tipo_pessoa", rename_all = "UPPERCASE")]
pub enum TipoPessoa {
    Fisica,
    Juridica,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endereco {
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub cep: Option<String>,
}

/// Nome/razão social, CPF/CNPJ e endereço de uma pessoa física ou jurídica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DadosPessoa {
    pub nome: String,
    pub documento: Option<String>,
    pub endereco: Option<Endereco>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientePagador {
    pub cliente_id: i64,
    pub tipo_pessoa: TipoPessoa,
    pub pessoa_fisica: Option<DadosPessoa>,
    pub pessoa_juridica: Option<DadosPessoa>,
}

impl Endereco {
    /// Logradouro com o número, quando houver.
    pub fn linha(&self) -> Option<String> {
        let logradouro = self.logradouro.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
        match self.numero.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(numero) => Some(format!("{} {}", logradouro, numero)),
            None => Some(logradouro.to_string()),
        }
    }
}

impl ClientePagador {
    /// Escolhe os dados conforme o tipo de pessoa, caindo para o outro
    /// cadastro quando o esperado não existe.
    pub fn dados_pagador(&self) -> Option<(DocumentType, &DadosPessoa)> {
        let pf = self.pessoa_fisica.as_ref().map(|p| (DocumentType::Cpf, p));
        let pj = self.pessoa_juridica.as_ref().map(|p| (DocumentType::Cnpj, p));
        match self.tipo_pessoa {
            TipoPessoa::Fisica => pf.or(pj),
            TipoPessoa::Juridica => pj.or(pf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContratoPagador {
    pub contrato_id: i64,
    pub cliente: Option<ClientePagador>,
}
