// src/common/db_utils.rs

use serde_json::Value;

/// Corta uma string em `max_chars` caracteres (respeitando UTF-8).
pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &value[..idx]),
        None => value.to_string(),
    }
}

/// Snapshot textual e truncado de um JSON para os logs de auditoria.
pub(crate) fn json_snapshot(value: &Value, max_chars: usize) -> String {
    truncate_chars(&value.to_string(), max_chars)
}

/// Converte um texto opcional em `None` quando vazio ou só espaços.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    })
}
