use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::types::{CategoryMap, RecordSummary, TagBatchResponse};
use super::BackendError;
use crate::store::RecordId;

pub const SYSTEM: &str = "You organize podcast subscriptions. Answer with a single JSON object and nothing else.";

pub fn categorize_prompt(records: &[RecordSummary]) -> Result<String, BackendError> {
    let listing = serde_json::to_string_pretty(records)?;
    Ok(format!(
        "Group the following {n} podcasts into meaningful categories.\n\
         Prefer 5 to 15 categories with descriptive names (for example \"Technology & AI\", \
         \"Business & Finance\", \"History\"). Every podcast id must appear in exactly one category.\n\n\
         Podcasts:\n{listing}\n\n\
         Respond with JSON in exactly this shape:\n\
         {{\"categories\": {{\"Category Name\": [0, 3, 7], \"Another Category\": [1, 2]}}}}",
        n = records.len(),
    ))
}

pub fn tag_prompt(category: &str, records: &[RecordSummary]) -> Result<String, BackendError> {
    let listing = serde_json::to_string_pretty(records)?;
    Ok(format!(
        "These podcasts all belong to the category \"{category}\".\n\
         Give each one 3 to 5 short, lowercase, specific tags describing its topics, format or style. \
         Use dashes instead of spaces and do not repeat the category name verbatim.\n\n\
         Podcasts:\n{listing}\n\n\
         Respond with JSON in exactly this shape, keyed by podcast id:\n\
         {{\"tags\": {{\"0\": [\"tag-one\", \"tag-two\", \"tag-three\"]}}}}"
    ))
}

/// Pull the first JSON object out of a chatty reply: plain JSON, a fenced
/// block, or the outermost `{ .. }` span.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    if let Some(body) = fenced_body(trimmed) {
        if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(body.trim()) {
            return Some(v);
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start { return None; }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

fn fenced_body(s: &str) -> Option<&str> {
    let open = s.find("```")?;
    let rest = &s[open + 3..];
    // skip the language tag line, e.g. ```json
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &rest[body_start..];
    let close = rest.find("```")?;
    Some(&rest[..close])
}

fn as_record_id(v: &Value) -> Option<RecordId> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| RecordId::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_tags(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(|t| t.as_str().map(str::to_string)).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Accepts `{"categories": {name: [ids]}}`, a bare `{name: [ids]}`, or the
/// per-podcast form `{"podcasts": {id: {"category": name}}}`.
pub fn parse_category_map(content: &str) -> Result<CategoryMap, BackendError> {
    let v = extract_json(content)
        .ok_or_else(|| BackendError::Malformed("no JSON object in response".into()))?;

    let mut map: BTreeMap<String, Vec<RecordId>> = BTreeMap::new();
    if let Some(Value::Object(podcasts)) = v.get("podcasts") {
        for (id, entry) in podcasts {
            let Ok(id) = id.trim().parse::<RecordId>() else { continue };
            let Some(name) = entry.get("category").and_then(Value::as_str) else { continue };
            let name = name.trim();
            if !name.is_empty() {
                map.entry(name.to_string()).or_default().push(id);
            }
        }
    } else {
        let node = v.get("categories").unwrap_or(&v);
        let obj = node
            .as_object()
            .ok_or_else(|| BackendError::Malformed("categories is not an object".into()))?;
        for (name, members) in obj {
            let name = name.trim();
            let ids: Vec<RecordId> = members
                .as_array()
                .map(|a| a.iter().filter_map(as_record_id).collect())
                .unwrap_or_default();
            if !name.is_empty() && !ids.is_empty() {
                map.entry(name.to_string()).or_default().extend(ids);
            }
        }
    }

    if map.is_empty() {
        return Err(BackendError::Malformed("response names no categories".into()));
    }
    Ok(CategoryMap(map))
}

/// Accepts `{"tags": {id: [..]}}`, a bare `{id: [..]}`, or
/// `{"tags": [{"id": .., "tags": [..]}]}`.
pub fn parse_tag_response(content: &str) -> Result<TagBatchResponse, BackendError> {
    let v = extract_json(content)
        .ok_or_else(|| BackendError::Malformed("no JSON object in response".into()))?;
    let node = v.get("tags").or_else(|| v.get("podcasts")).unwrap_or(&v);

    let mut out: HashMap<RecordId, Vec<String>> = HashMap::new();
    match node {
        Value::Object(obj) => {
            for (id, entry) in obj {
                let Ok(id) = id.trim().parse::<RecordId>() else { continue };
                let tags = entry.get("tags").map(as_tags).unwrap_or_else(|| as_tags(entry));
                out.insert(id, tags);
            }
        }
        Value::Array(items) => {
            for item in items {
                let Some(id) = item.get("id").and_then(as_record_id) else { continue };
                out.insert(id, item.get("tags").map(as_tags).unwrap_or_default());
            }
        }
        _ => {}
    }

    if out.is_empty() {
        return Err(BackendError::Malformed("response carries no tags".into()));
    }
    Ok(TagBatchResponse(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_fences_and_prose() {
        let fenced = "Here you go:\n```json\n{\"categories\": {\"Tech\": [0]}}\n```\nEnjoy!";
        assert!(extract_json(fenced).is_some());
        let prose = "Sure! {\"a\": 1} hope that helps";
        assert_eq!(extract_json(prose), Some(serde_json::json!({"a": 1})));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("[1, 2, 3]"), None);
    }

    #[test]
    fn category_map_accepts_numeric_and_string_ids() {
        let map = parse_category_map(r#"{"categories": {"Tech": [0, "2"], "  ": [1], "News": []}}"#).unwrap();
        assert_eq!(map.0.len(), 1);
        assert_eq!(map.0["Tech"], vec![0, 2]);
    }

    #[test]
    fn category_map_accepts_per_podcast_shape() {
        let map = parse_category_map(
            r#"{"podcasts": {"0": {"category": "History", "tags": ["wwii"]}, "1": {"category": "History"}}}"#,
        )
        .unwrap();
        assert_eq!(map.0["History"], vec![0, 1]);
    }

    #[test]
    fn unusable_category_responses_are_malformed() {
        assert!(matches!(parse_category_map("I cannot help with that"), Err(BackendError::Malformed(_))));
        assert!(matches!(parse_category_map(r#"{"categories": []}"#), Err(BackendError::Malformed(_))));
        assert!(matches!(parse_category_map(r#"{"categories": {}}"#), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn tag_response_shapes() {
        let keyed = parse_tag_response(r#"{"tags": {"3": ["a", "b"], "x": ["ignored"]}}"#).unwrap();
        assert_eq!(keyed.tags_for(3), &["a".to_string(), "b".to_string()]);
        assert!(keyed.tags_for(4).is_empty());

        let listed = parse_tag_response(r#"{"tags": [{"id": "5", "tags": ["c"]}, {"tags": ["no id"]}]}"#).unwrap();
        assert_eq!(listed.0.len(), 1);
        assert_eq!(listed.tags_for(5), &["c".to_string()]);

        let csv = parse_tag_response(r#"{"7": "history, wwii"}"#).unwrap();
        assert_eq!(csv.tags_for(7).len(), 2);
    }

    #[test]
    fn prompts_carry_ids_and_category() {
        let records = vec![RecordSummary { id: 4, title: "Acquired".into(), description: "Company stories".into() }];
        let p = tag_prompt("Business", &records).unwrap();
        assert!(p.contains("\"Business\""));
        assert!(p.contains("\"id\": 4"));
        let p = categorize_prompt(&records).unwrap();
        assert!(p.contains("1 podcasts"));
        assert!(p.contains("Acquired"));
    }
}
