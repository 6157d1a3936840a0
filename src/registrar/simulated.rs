// src/registrar/simulated.rs
//
// Registrador de mentira para desenvolvimento (SANTANDER_MODO_SIMULACAO=true).
// Nenhuma chamada de rede; devolve artefatos com formato plausível.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use uuid::Uuid;

use crate::{
    models::boleto::Boleto,
    registrar::{
        describe_bank_status, QueryType, RegistrarClient, RegistrarError, RegistrationReceipt,
        StatusResponse,
    },
};

const PDF_LINK_SIMULADO: &str = "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf";

// Menor PDF válido de uma página em branco
const PDF_SIMULADO: &[u8] = b"%PDF-1.4\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj\n\
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 595 842]>>endobj\n\
trailer<</Root 1 0 R>>\n%%EOF\n";

#[derive(Debug, Default, Clone)]
pub struct SimulatedRegistrar;

impl SimulatedRegistrar {
    pub fn new() -> Self {
        tracing::warn!("⚠️ MODO SIMULAÇÃO ATIVADO - nenhum boleto será registrado de verdade");
        Self
    }
}

fn random_in(min: u32, max: u32) -> u32 {
    let span = (max - min) as u128;
    min + (Uuid::new_v4().as_u128() % span) as u32
}

pub(crate) fn simulated_receipt(boleto: &Boleto) -> RegistrationReceipt {
    let reais = boleto.nominal_value.trunc().to_u64().unwrap_or(0);
    let centavos = (boleto.nominal_value * Decimal::ONE_HUNDRED).trunc().to_u64().unwrap_or(0);

    let bar_code = format!(
        "03399{}00000{:09}0{:0>13}",
        random_in(10_000, 99_999),
        reais % 1_000_000_000,
        boleto.bank_number
    );
    let digitable_line = format!(
        "03399.{} {}.{} {}.{} {} {:014}",
        random_in(10_000, 99_999),
        random_in(10_000, 99_999),
        random_in(100_000, 999_999),
        random_in(10_000, 99_999),
        random_in(100_000, 999_999),
        random_in(1, 9),
        centavos
    );
    let qr_code_pix = format!(
        "00020101021226900014br.gov.bcb.pix{}5204000053039865802BR5913CRM COBRANCA6009SAO PAULO62{}6304{}",
        Uuid::new_v4().simple(),
        boleto.nsu_code,
        random_in(1000, 9999)
    );

    RegistrationReceipt {
        bar_code: Some(bar_code),
        digitable_line: Some(digitable_line),
        qr_code_pix: Some(qr_code_pix),
        qr_code_url: Some(format!("https://pix.simulado.dev/qr/{}", boleto.nsu_code)),
        entry_date: Some(Local::now().date_naive()),
    }
}

#[async_trait]
impl RegistrarClient for SimulatedRegistrar {
    async fn register(&self, boleto: &Boleto) -> Result<RegistrationReceipt, RegistrarError> {
        tracing::info!(nsu = %boleto.nsu_code, "🎭 Gerando resposta simulada de registro");
        Ok(simulated_receipt(boleto))
    }

    async fn query_by_bank_number(
        &self,
        beneficiary_code: &str,
        bank_number: &str,
    ) -> Result<StatusResponse, RegistrarError> {
        Ok(StatusResponse {
            beneficiary_code: Some(beneficiary_code.to_string()),
            bank_number: Some(bank_number.to_string()),
            status: Some("ATIVO".to_string()),
            status_description: Some(describe_bank_status(Some("ATIVO"))),
            consulted_at: Some(Utc::now()),
            query_type: Some("nosso_numero".to_string()),
            ..Default::default()
        })
    }

    async fn query_by_client_number(
        &self,
        beneficiary_code: &str,
        client_number: &str,
        due_date: NaiveDate,
        nominal_value: Decimal,
    ) -> Result<StatusResponse, RegistrarError> {
        Ok(StatusResponse {
            beneficiary_code: Some(beneficiary_code.to_string()),
            client_number: Some(client_number.to_string()),
            due_date: Some(due_date.format("%Y-%m-%d").to_string()),
            nominal_value: Some(nominal_value),
            status: Some("ATIVO".to_string()),
            status_description: Some(describe_bank_status(Some("ATIVO"))),
            consulted_at: Some(Utc::now()),
            query_type: Some("seu_numero".to_string()),
            ..Default::default()
        })
    }

    async fn query_by_bill_id(
        &self,
        bill_id: &str,
        query_type: QueryType,
    ) -> Result<StatusResponse, RegistrarError> {
        let (beneficiary_code, bank_number) = bill_id.split_once('.').unwrap_or(("", bill_id));
        Ok(StatusResponse {
            beneficiary_code: Some(beneficiary_code.to_string()).filter(|b| !b.is_empty()),
            bank_number: Some(bank_number.to_string()),
            status: Some("ATIVO".to_string()),
            status_description: Some(describe_bank_status(Some("ATIVO"))),
            consulted_at: Some(Utc::now()),
            query_type: Some(query_type.as_str().to_string()),
            ..Default::default()
        })
    }

    async fn cancel(&self, _covenant_code: &str, bank_number: &str, _nsu_date: NaiveDate) -> Result<(), RegistrarError> {
        tracing::info!(bank_number, "🎭 Baixa simulada");
        Ok(())
    }

    async fn fetch_pdf_link(
        &self,
        _bank_number: &str,
        _covenant_code: &str,
        _payer_document_number: &str,
    ) -> Result<String, RegistrarError> {
        Ok(PDF_LINK_SIMULADO.to_string())
    }

    async fn download_pdf(&self, _url: &str) -> Result<Vec<u8>, RegistrarError> {
        Ok(PDF_SIMULADO.to_vec())
    }
}
