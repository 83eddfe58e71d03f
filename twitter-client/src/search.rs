//! Search responses arrive either as `{ "result": [...] }` or `{ "data": [...] }`.
//! Both are folded into a plain list of candidates here, so nothing past the
//! platform boundary has to care which one it got.

use persona_core::CandidatePost;
use serde_json::Value;
use tracing::debug;

/// Extracts candidate posts from a search response.
///
/// `result` wins when both keys hold arrays. A missing key, `null`, or a
/// non-array value means no results rather than an error. Entries without an
/// id are dropped.
pub fn normalize_search_response(response: &Value) -> Vec<CandidatePost> {
    let entries = ["result", "data"]
        .iter()
        .find_map(|key| response.get(key).and_then(Value::as_array));

    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = match entry.get("id") {
                Some(Value::String(id)) if !id.is_empty() => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => {
                    debug!("Dropping search entry without an id: {}", entry);
                    return None;
                }
            };
            let text = entry.get("text").and_then(Value::as_str).map(str::to_string);
            Some(CandidatePost { id, text })
        })
        .collect()
}
