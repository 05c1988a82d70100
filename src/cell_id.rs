/// Cell identity resolution
///
/// Pulls an H3 cell out of a record of unknown shape. Rejection is a normal,
/// silent outcome: callers drop the record and carry on with the batch.

use crate::constants::CELL_ID_ALIASES;
use crate::json_parser::JsonParser;
use h3o::CellIndex;
use serde_json::Value;

/// The raw candidate token for `record`: the record itself when it is a bare
/// string or integer, otherwise the first non-null alias field.
pub fn candidate(record: &Value) -> Option<&Value> {
    match record {
        Value::String(_) | Value::Number(_) => Some(record),
        Value::Object(_) => JsonParser::first_present(record, CELL_ID_ALIASES),
        _ => None,
    }
}

/// Parse a single token as a cell: hex string or unsigned 64-bit integer.
pub fn parse_cell_token(token: &Value) -> Option<CellIndex> {
    match token {
        Value::String(s) => s.trim().parse::<CellIndex>().ok(),
        Value::Number(n) => n.as_u64().and_then(|raw| CellIndex::try_from(raw).ok()),
        _ => None,
    }
}

/// Resolve the cell identifier of `record`.
///
/// Only the first present candidate is considered; if it does not validate,
/// the record has no identity (later aliases are not tried).
pub fn resolve_cell_id(record: &Value) -> Option<CellIndex> {
    candidate(record).and_then(parse_cell_token)
}
