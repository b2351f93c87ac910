use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use serde_json::{json, Value};
use url::Url;

use crate::config::PAGE_SIZE;

const APP_VERSION: &str = "2.55";
const PM_VERSION: &str = "2025.45.0";
const MAX_DEPTH: usize = 10;

/// URL of one page of the closet's filtered-posts endpoint. Only available
/// inventory is requested.
pub fn page_url(base: &str, username: &str, cursor: Option<&str>) -> Result<String, url::ParseError> {
    let mut request = json!({
        "filters": { "department": "All", "inventory_status": ["available"] },
        "experience": "all",
        "count": PAGE_SIZE,
        "static_facets": false,
    });
    if let Some(c) = cursor {
        request["max_id"] = Value::String(c.to_string());
    }

    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(["vm-rest", "users", username, "posts", "filtered"]);
    url.query_pairs_mut()
        .append_pair("request", &request.to_string())
        .append_pair("summarize", "true")
        .append_pair("app_version", APP_VERSION)
        .append_pair("pm_version", PM_VERSION);
    Ok(url.into())
}

/// URL of the server-rendered closet grid.
pub fn closet_url(base: &str, username: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(["closet", username]);
    url.query_pairs_mut().append_pair("availability", "available");
    Ok(url.into())
}

/// Synthetic cursor used when a response names its page group but carries no
/// `next_max_id`.
pub fn group_cursor(page_num: usize, page_group_id: &str) -> String {
    let id = Value::String(page_group_id.to_string());
    let raw = format!(
        r#"{{"max_ids": [{}], "page_num": {}, "page_group_id": {}}}"#,
        PAGE_SIZE * page_num.saturating_sub(1),
        page_num,
        id
    );
    format!("ENC_{}", STANDARD_NO_PAD.encode(raw))
}

/// First `next_max_id` in the response, or a `max_id` that differs from the
/// cursor used for this request.
pub fn find_next_cursor(data: &Value, current: Option<&str>) -> Option<String> {
    find_cursor(data, current, 0)
}

fn find_cursor(v: &Value, current: Option<&str>, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH { return None; }
    match v {
        Value::Object(map) => {
            if let Some(next) = map.get("next_max_id").and_then(scalar_string) {
                return Some(next);
            }
            if let Some(max) = map.get("max_id").and_then(scalar_string) {
                if Some(max.as_str()) != current { return Some(max); }
            }
            map.values().find_map(|child| find_cursor(child, current, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|child| find_cursor(child, current, depth + 1)),
        _ => None,
    }
}

pub fn find_page_group_id(data: &Value) -> Option<String> {
    find_group(data, 0)
}

fn find_group(v: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH { return None; }
    match v {
        Value::Object(map) => map
            .get("page_group_id")
            .and_then(scalar_string)
            .or_else(|| map.values().find_map(|child| find_group(child, depth + 1))),
        Value::Array(items) => items.iter().find_map(|child| find_group(child, depth + 1)),
        _ => None,
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
