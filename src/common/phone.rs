// src/common/phone.rs

//! Normalização de telefones para a forma canônica `+1XXXXXXXXXX`.
//!
//! É a única derivação de chave usada na deduplicação de contatos, então
//! precisa ser pura e determinística.

/// Converte um telefone arbitrário para `+1` seguido de 10 dígitos.
///
/// Retorna `None` quando o número é curto demais (ou vazio).
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let digits: String = raw?.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => Some(format!("+1{}", digits)),
        11 if digits.starts_with('1') => Some(format!("+{}", digits)),
        // Primeiro dígito é um código de país trocado: descarta
        11 => Some(format!("+1{}", &digits[1..])),
        // `+` + 11 dígitos: o que sobra depois do número é descartado
        12 if digits.starts_with('1') => Some(format!("+{}", &digits[..11])),
        n if n > 10 => Some(format!("+1{}", &digits[n - 10..])),
        _ => None,
    }
}

/// Formato de exibição `(XXX) XXX-XXXX` de um telefone já normalizado.
pub fn display_phone(normalized: &str) -> String {
    let digits: String = normalized.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = if digits.len() > 10 { &digits[digits.len() - 10..] } else { digits.as_str() };

    if local.len() != 10 {
        return normalized.to_string();
    }
    format!("({}) {}-{}", &local[..3], &local[3..6], &local[6..])
}
