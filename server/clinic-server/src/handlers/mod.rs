pub mod auth;
pub mod clientes;
pub mod examenes;
pub mod facturas;
pub mod formulas;
pub mod health;
pub mod historias;
pub mod notas;
pub mod usuarios;

use std::collections::HashMap;
use std::hash::Hash;

/// Group child rows under their parent key, keeping row order
pub(crate) fn group_by<K, V>(rows: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, Vec<V>>
where
    K: Eq + Hash,
{
    let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

/// Trimmed value, or `None` when blank
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
