// src/db/boleto_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, FromRow, PgPool, Postgres};

use crate::{
    common::error::AppError,
    db::store::BoletoStore,
    models::{
        auth::Caller,
        boleto::{Boleto, BoletoEvento, BoletoStatus, NovoBoleto, NovoEvento, TipoEvento},
        contrato::{ClientePagador, ContratoPagador, DadosPessoa, Endereco, TipoPessoa},
        dashboard::{FaturamentoRow, LiquidacaoRow, StatusTotal},
    },
};

#[derive(Clone)]
pub struct BoletoRepository {
    pool: PgPool,
}

impl BoletoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_evento<'e, E>(executor: E, boleto_id: i64, evento: &NovoEvento) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO boleto_eventos (boleto_id, tipo, status_anterior, status_novo, usuario_id, detalhe)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(boleto_id)
        .bind(evento.tipo)
        .bind(evento.status_anterior)
        .bind(evento.status_novo)
        .bind(evento.usuario_id)
        .bind(&evento.detalhe)
        .execute(executor)
        .await?;
        Ok(())
    }
}

// Linha achatada do JOIN contrato -> cliente -> pessoa -> endereço
#[derive(Debug, FromRow)]
struct ContratoPagadorRow {
    contrato_id: i64,
    cliente_id: Option<i64>,
    tipo_pessoa: Option<TipoPessoa>,

    pf_nome: Option<String>,
    pf_documento: Option<String>,
    pf_logradouro: Option<String>,
    pf_numero: Option<String>,
    pf_bairro: Option<String>,
    pf_cidade: Option<String>,
    pf_estado: Option<String>,
    pf_cep: Option<String>,

    pj_nome: Option<String>,
    pj_documento: Option<String>,
    pj_logradouro: Option<String>,
    pj_numero: Option<String>,
    pj_bairro: Option<String>,
    pj_cidade: Option<String>,
    pj_estado: Option<String>,
    pj_cep: Option<String>,
}

impl ContratoPagadorRow {
    fn into_model(self) -> ContratoPagador {
        let endereco = |logradouro: Option<String>,
                        numero: Option<String>,
                        bairro: Option<String>,
                        cidade: Option<String>,
                        estado: Option<String>,
                        cep: Option<String>| {
            let e = Endereco { logradouro, numero, bairro, cidade, estado, cep };
            (e != Endereco::default()).then_some(e)
        };

        let pessoa_fisica = self.pf_nome.map(|nome| DadosPessoa {
            nome,
            documento: self.pf_documento,
            endereco: endereco(
                self.pf_logradouro,
                self.pf_numero,
                self.pf_bairro,
                self.pf_cidade,
                self.pf_estado,
                self.pf_cep,
            ),
        });
        let pessoa_juridica = self.pj_nome.map(|nome| DadosPessoa {
            nome,
            documento: self.pj_documento,
            endereco: endereco(
                self.pj_logradouro,
                self.pj_numero,
                self.pj_bairro,
                self.pj_cidade,
                self.pj_estado,
                self.pj_cep,
            ),
        });

        let cliente = match (self.cliente_id, self.tipo_pessoa) {
            (Some(cliente_id), Some(tipo_pessoa)) => Some(ClientePagador {
                cliente_id,
                tipo_pessoa,
                pessoa_fisica,
                pessoa_juridica,
            }),
            _ => None,
        };

        ContratoPagador { contrato_id: self.contrato_id, cliente }
    }
}

fn map_insert_error(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("boletos").to_string();
            return AppError::DuplicateIdentifier(constraint);
        }
    }
    e.into()
}

#[async_trait]
impl BoletoStore for BoletoRepository {
    async fn find_contrato_pagador(&self, contrato_id: i64) -> Result<Option<ContratoPagador>, AppError> {
        let row = sqlx::query_as::<_, ContratoPagadorRow>(
            r#"
            SELECT
                c.id AS contrato_id,
                cl.id AS cliente_id,
                cl.tipo_pessoa,
                pf.nome AS pf_nome, pf.cpf AS pf_documento,
                epf.logradouro AS pf_logradouro, epf.numero AS pf_numero, epf.bairro AS pf_bairro,
                epf.cidade AS pf_cidade, epf.estado AS pf_estado, epf.cep AS pf_cep,
                pj.razao_social AS pj_nome, pj.cnpj AS pj_documento,
                epj.logradouro AS pj_logradouro, epj.numero AS pj_numero, epj.bairro AS pj_bairro,
                epj.cidade AS pj_cidade, epj.estado AS pj_estado, epj.cep AS pj_cep
            FROM contratos c
            LEFT JOIN clientes cl ON cl.id = c.cliente_id
            LEFT JOIN pessoas_fisicas pf ON pf.id = cl.pessoa_fisica_id
            LEFT JOIN enderecos epf ON epf.id = pf.endereco_id
            LEFT JOIN pessoas_juridicas pj ON pj.id = cl.pessoa_juridica_id
            LEFT JOIN enderecos epj ON epj.id = pj.endereco_id
            WHERE c.id = $1
            "#,
        )
        .bind(contrato_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ContratoPagadorRow::into_model))
    }

    async fn last_client_number(&self) -> Result<Option<String>, AppError> {
        let last = sqlx::query_scalar::<_, String>(
            "SELECT client_number FROM boletos ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(last)
    }

    async fn insert_intent(&self, novo: &NovoBoleto, caller: &Caller) -> Result<Boleto, AppError> {
        let mut tx = self.pool.begin().await?;

        let boleto = sqlx::query_as::<_, Boleto>(
            r#"
            INSERT INTO boletos (
                contrato_id, nsu_code, nsu_date, covenant_code, bank_number, client_number,
                due_date, issue_date, nominal_value, document_kind,
                fine_percentage, fine_quantity_days, interest_percentage, deduction_value,
                write_off_quantity_days, messages,
                payer_name, payer_document_type, payer_document_number, payer_address,
                payer_neighborhood, payer_city, payer_state, payer_zip_code,
                status, criado_por
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14,
                $15, $16,
                $17, $18, $19, $20,
                $21, $22, $23, $24,
                'PENDENTE', $25
            )
            RETURNING *
            "#,
        )
        .bind(novo.contrato_id)
        .bind(&novo.nsu_code)
        .bind(novo.nsu_date)
        .bind(&novo.covenant_code)
        .bind(&novo.bank_number)
        .bind(&novo.client_number)
        .bind(novo.due_date)
        .bind(novo.issue_date)
        .bind(novo.nominal_value)
        .bind(&novo.document_kind)
        .bind(novo.fine_percentage)
        .bind(novo.fine_quantity_days)
        .bind(novo.interest_percentage)
        .bind(novo.deduction_value)
        .bind(novo.write_off_quantity_days)
        .bind(&novo.messages)
        .bind(&novo.payer.name)
        .bind(novo.payer.document_type)
        .bind(&novo.payer.document_number)
        .bind(&novo.payer.address)
        .bind(&novo.payer.neighborhood)
        .bind(&novo.payer.city)
        .bind(&novo.payer.state)
        .bind(&novo.payer.zip_code)
        .bind(caller.usuario_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        let evento = NovoEvento {
            tipo: TipoEvento::Criacao,
            status_anterior: None,
            status_novo: boleto.status,
            usuario_id: caller.usuario_id,
            detalhe: Some(format!("NSU {} / nosso número {}", boleto.nsu_code, boleto.bank_number)),
        };
        Self::insert_evento(&mut *tx, boleto.id, &evento).await?;

        tx.commit().await?;
        Ok(boleto)
    }

    async fn save(&self, boleto: &Boleto, esperado: BoletoStatus, evento: NovoEvento) -> Result<Boleto, AppError> {
        let mut tx = self.pool.begin().await?;

        // Identificadores, valores e pagador não entram no UPDATE.
        let saved = sqlx::query_as::<_, Boleto>(
            r#"
            UPDATE boletos SET
                status = $2,
                bar_code = $3,
                digitable_line = $4,
                entry_date = $5,
                qr_code_pix = $6,
                qr_code_url = $7,
                paid_value = $8,
                settlement_date = $9,
                error_code = $10,
                error_message = $11,
                trace_id = $12,
                ativo = $13,
                data_atualizacao = $14,
                atualizado_por = $15
            WHERE id = $1 AND status = $16
            RETURNING *
            "#,
        )
        .bind(boleto.id)
        .bind(boleto.status)
        .bind(&boleto.bar_code)
        .bind(&boleto.digitable_line)
        .bind(boleto.entry_date)
        .bind(&boleto.qr_code_pix)
        .bind(&boleto.qr_code_url)
        .bind(boleto.paid_value)
        .bind(boleto.settlement_date)
        .bind(&boleto.error_code)
        .bind(&boleto.error_message)
        .bind(&boleto.trace_id)
        .bind(boleto.ativo)
        .bind(boleto.data_atualizacao)
        .bind(boleto.atualizado_por)
        .bind(esperado)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(saved) = saved else {
            // Status mudou desde a leitura (ou a linha sumiu): devolve o estado atual.
            let atual = sqlx::query_as::<_, Boleto>("SELECT * FROM boletos WHERE id = $1")
                .bind(boleto.id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Boleto {} não encontrado", boleto.id)))?;
            tx.rollback().await?;

            tracing::warn!(
                boleto_id = boleto.id,
                esperado = %esperado,
                atual = %atual.status,
                "⚠️ Boleto alterado por outra operação, gravação descartada"
            );
            return Ok(atual);
        };

        Self::insert_evento(&mut *tx, saved.id, &evento).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Boleto>, AppError> {
        let boleto = sqlx::query_as::<_, Boleto>("SELECT * FROM boletos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(boleto)
    }

    async fn list_active(&self) -> Result<Vec<Boleto>, AppError> {
        let boletos = sqlx::query_as::<_, Boleto>(
            "SELECT * FROM boletos WHERE ativo = true ORDER BY data_cadastro DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(boletos)
    }

    async fn list_by_contrato(&self, contrato_id: i64) -> Result<Vec<Boleto>, AppError> {
        let boletos = sqlx::query_as::<_, Boleto>(
            r#"
            SELECT * FROM boletos
            WHERE contrato_id = $1 AND ativo = true
            ORDER BY data_cadastro DESC, id DESC
            "#,
        )
        .bind(contrato_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(boletos)
    }

    async fn list_syncable(&self) -> Result<Vec<Boleto>, AppError> {
        let boletos = sqlx::query_as::<_, Boleto>(
            r#"
            SELECT * FROM boletos
            WHERE ativo = true AND status IN ('REGISTRADO', 'ATIVO')
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(boletos)
    }

    async fn list_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Boleto>, AppError> {
        let boletos = sqlx::query_as::<_, Boleto>(
            r#"
            SELECT * FROM boletos
            WHERE status = 'PENDENTE' AND data_cadastro < $1
            ORDER BY id
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        Ok(boletos)
    }

    async fn list_events(&self, boleto_id: i64) -> Result<Vec<BoletoEvento>, AppError> {
        let eventos = sqlx::query_as::<_, BoletoEvento>(
            "SELECT * FROM boleto_eventos WHERE boleto_id = $1 ORDER BY criado_em, id",
        )
        .bind(boleto_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(eventos)
    }

    async fn status_totals(&self) -> Result<Vec<StatusTotal>, AppError> {
        let totals = sqlx::query_as::<_, StatusTotal>(
            r#"
            SELECT status, COUNT(*) AS quantidade, COALESCE(SUM(nominal_value), 0) AS valor_total
            FROM boletos
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(totals)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM boletos WHERE data_cadastro >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn liquidados_desde(&self, desde: NaiveDate) -> Result<Vec<LiquidacaoRow>, AppError> {
        // Margem de um dia para a diferença entre UTC e o fuso local.
        let rows = sqlx::query_as::<_, LiquidacaoRow>(
            r#"
            SELECT nominal_value, settlement_date, data_atualizacao
            FROM boletos
            WHERE status = 'LIQUIDADO'
              AND COALESCE(settlement_date, data_atualizacao::date) >= ($1::date - 1)
            "#,
        )
        .bind(desde)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn faturamento_por_cliente(&self) -> Result<Vec<FaturamentoRow>, AppError> {
        let rows = sqlx::query_as::<_, FaturamentoRow>(
            r#"
            SELECT
                cl.id AS cliente_id,
                cl.tipo_pessoa,
                CASE WHEN cl.tipo_pessoa = 'FISICA' THEN pf.nome ELSE pj.razao_social END AS cliente_nome,
                CASE WHEN cl.tipo_pessoa = 'FISICA' THEN pf.cpf ELSE pj.cnpj END AS cliente_documento,
                b.id AS boleto_id,
                b.contrato_id,
                b.nsu_code,
                b.issue_date,
                b.due_date,
                b.settlement_date,
                b.nominal_value,
                b.status,
                b.payer_name,
                b.payer_document_number
            FROM boletos b
            JOIN contratos c ON c.id = b.contrato_id AND c.ativo = true
            JOIN clientes cl ON cl.id = c.cliente_id AND cl.ativo = true
            LEFT JOIN pessoas_fisicas pf ON pf.id = cl.pessoa_fisica_id
            LEFT JOIN pessoas_juridicas pj ON pj.id = cl.pessoa_juridica_id
            ORDER BY cl.id, b.due_date, b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
