// src/services/sanitizer.rs
//
// Higienização do texto do pagador antes de ir ao banco. O registrador só
// aceita [A-Za-z0-9 ] e impõe tamanho máximo por campo.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayerField {
    Name,
    Address,
    Neighborhood,
    City,
    DocumentNumber,
}

impl PayerField {
    pub const fn max_len(self) -> usize {
        match self {
            PayerField::Name => 40,
            PayerField::Address => 40,
            PayerField::Neighborhood => 30,
            PayerField::City => 20,
            PayerField::DocumentNumber => 15,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PayerField::Name => "PayerName",
            PayerField::Address => "PayerAddress",
            PayerField::Neighborhood => "PayerNeighborhood",
            PayerField::City => "PayerCity",
            PayerField::DocumentNumber => "PayerDocumentNumber",
        }
    }
}

pub const DEFAULT_ADDRESS: &str = "Endereco nao informado";
pub const DEFAULT_NEIGHBORHOOD: &str = "Bairro nao informado";
pub const DEFAULT_CITY: &str = "Cidade nao informada";
pub const DEFAULT_STATE: &str = "SP";
pub const DEFAULT_ZIP: &str = "00000-000";
pub const DEFAULT_DOCUMENT: &str = "00000000000";

// Pontuação que o banco rejeita; vira espaço.
const PUNCTUATION: &[char] = &[
    '.', '-', '/', '\\', '(', ')', '[', ']', '{', '}', '@', '#', '$', '%', '*', '+', '=', '!', '?',
    ':', ';', ',', '<', '>', '|', '_', '~', '`', '^', '\'', '"',
];

fn fold_char(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'ã' | 'â' | 'ä' | 'å' => 'a',
        'Á' | 'À' | 'Ã' | 'Â' | 'Ä' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'õ' | 'ô' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Õ' | 'Ô' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        // aspas e travessões tipográficos
        '\u{2018}' | '\u{2019}' | '\u{00B4}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2013}' | '\u{2014}' => '-',
        '\r' | '\n' | '\t' => ' ',
        _ => return None,
    };
    Some(folded)
}

/// Passos 1 a 3: remove acentos e pontuação, fecha no conjunto
/// `[A-Za-z0-9 ]`, colapsa espaços e apara as pontas.
pub fn clean_text(input: &str) -> String {
    let mut mapped = String::with_capacity(input.len());
    for c in input.chars() {
        let c = fold_char(c).unwrap_or(c);
        match c {
            '&' => mapped.push('E'),
            c if PUNCTUATION.contains(&c) => mapped.push(' '),
            c if c.is_ascii_alphanumeric() => mapped.push(c),
            // fora da lista permitida
            _ => mapped.push(' '),
        }
    }
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trunca no limite do campo, registrando antes/depois quando corta.
pub fn truncate_field(field: PayerField, value: String) -> String {
    let max = field.max_len();
    if value.chars().count() <= max {
        return value;
    }
    let truncated: String = value.chars().take(max).collect::<String>().trim_end().to_string();
    tracing::warn!(
        campo = field.label(),
        limite = max,
        original = %value,
        truncado = %truncated,
        "✂️ Campo truncado para o limite do banco"
    );
    truncated
}

pub fn sanitize(field: PayerField, input: &str) -> String {
    truncate_field(field, clean_text(input))
}

/// Igual a `sanitize`, mas usa `fallback` quando a entrada some na limpeza.
pub fn sanitize_or(field: PayerField, input: Option<&str>, fallback: &str) -> String {
    let cleaned = sanitize(field, input.unwrap_or_default());
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// CPF/CNPJ só com dígitos, limitado a 15; vazio vira o documento padrão.
pub fn document_number(input: Option<&str>) -> String {
    let digits = digits_only(input.unwrap_or_default());
    if digits.is_empty() {
        return DEFAULT_DOCUMENT.to_string();
    }
    truncate_field(PayerField::DocumentNumber, digits)
}

/// CEP no formato `00000-000` (zeros à esquerda ou corte em 8 dígitos).
pub fn format_zip(input: Option<&str>) -> String {
    let digits = digits_only(input.unwrap_or_default());
    if digits.is_empty() {
        return DEFAULT_ZIP.to_string();
    }
    let padded: String = format!("{:0>8}", digits).chars().take(8).collect();
    format!("{}-{}", &padded[..5], &padded[5..])
}

/// UF com duas letras maiúsculas; padrão `SP`.
pub fn normalize_state(input: Option<&str>) -> String {
    let letters: String = clean_text(input.unwrap_or_default())
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(2)
        .collect::<String>()
        .to_uppercase();
    if letters.len() == 2 {
        letters
    } else {
        DEFAULT_STATE.to_string()
    }
}

/// Nome do arquivo do PDF: `Boleto_{id}_{nome}_{yyyy-MM-dd}.pdf`.
pub fn pdf_file_name(boleto_id: i64, payer_name: &str, due_date: NaiveDate) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let cleaned: String = payer_name
        .chars()
        .filter(|c| !INVALID.contains(c) && !c.is_control())
        .collect();
    let mut name = cleaned.trim().replace(' ', "_");
    if name.chars().count() > 50 {
        name = name.chars().take(50).collect();
    }
    if name.is_empty() {
        name = "Cliente".to_string();
    }
    format!("Boleto_{}_{}_{}.pdf", boleto_id, name, due_date.format("%Y-%m-%d"))
}
