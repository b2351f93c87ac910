use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::listing::Listing;

const MAX_DEPTH: usize = 10;
const LIST_KEYS: [&str; 3] = ["posts", "data", "listings"];
const SKIP_KEYS: [&str; 3] = ["metadata", "facets", "summaries"];
const LISTING_KEYS: [&str; 6] = ["canonical_path", "path", "id", "title", "listing_id", "post_id"];

/// Locate the listing objects in a closet API response.
pub fn find_posts(data: &Value) -> Vec<&Value> {
    find_in(data, 0)
}

fn find_in(v: &Value, depth: usize) -> Vec<&Value> {
    if depth > MAX_DEPTH { return Vec::new(); }
    match v {
        Value::Object(map) => {
            for key in LIST_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.iter().collect();
                }
            }
            if looks_like_listing(v) {
                return vec![v];
            }
            map.iter()
                .filter(|(k, _)| !SKIP_KEYS.contains(&k.as_str()))
                .flat_map(|(_, child)| find_in(child, depth + 1))
                .collect()
        }
        Value::Array(items) => {
            if items.first().is_some_and(looks_like_listing) {
                return items.iter().collect();
            }
            items.iter().flat_map(|child| find_in(child, depth + 1)).collect()
        }
        _ => Vec::new(),
    }
}

fn looks_like_listing(v: &Value) -> bool {
    v.as_object().is_some_and(|m| LISTING_KEYS.iter().any(|k| m.contains_key(*k)))
}

/// Map one API post onto a summary record. Posts without any way to build a
/// link are dropped.
pub fn summary_from_post(post: &Value, base: &str) -> Option<Listing> {
    let id = text_at(post, &["id"]).or_else(|| text_at(post, &["listing_id"])).or_else(|| text_at(post, &["post_id"]));
    let title = text_at(post, &["title"]).unwrap_or_default();

    let path = text_at(post, &["canonical_path"])
        .or_else(|| text_at(post, &["path"]))
        .or_else(|| text_at(post, &["url"]))
        .or_else(|| match (&id, title.is_empty()) {
            (Some(id), false) => Some(format!("/listing/{}-{}", title_slug(&title), id)),
            (Some(id), true) => Some(format!("/listing/{}", id)),
            (None, _) => None,
        })?;

    let mut listing = Listing::from_link(absolutize(&path, base));
    listing.title = title;
    listing.price = text_at(post, &["price_amount", "val"]).or_else(|| text_at(post, &["price"])).map(|p| clean_price(&p)).unwrap_or_default();
    listing.original_price = text_at(post, &["original_price_amount", "val"]).or_else(|| text_at(post, &["original_price"])).map(|p| clean_price(&p)).unwrap_or_default();
    listing.size = text_at(post, &["size_obj", "display"]).or_else(|| text_at(post, &["size"])).unwrap_or_default();
    listing.brand = text_at(post, &["brand"]).unwrap_or_default();
    listing.condition = text_at(post, &["condition"]).map(|c| normalize_condition(&c)).unwrap_or_default();
    listing.likes = count_at(post, "like_count");
    listing.comments = count_at(post, "comment_count");
    Some(listing)
}

pub fn absolutize(path: &str, base: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if let Some(rest) = path.strip_prefix("//") {
        format!("https://{}", rest)
    } else if path.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}

/// Strip currency symbols and thousands separators.
pub fn clean_price(raw: &str) -> String {
    raw.trim().trim_start_matches('$').replace(',', "").trim().to_string()
}

fn normalize_condition(raw: &str) -> String {
    if raw.eq_ignore_ascii_case("nwt") { "NWT".to_string() } else { raw.to_string() }
}

fn title_slug(title: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static regex"));
    re.replace_all(title, "").trim().replace(' ', "-")
}

fn text_at(v: &Value, path: &[&str]) -> Option<String> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    match cur {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_at(v: &Value, key: &str) -> u32 {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://poshmark.com";

    #[test]
    fn finds_posts_under_data() {
        let data = json!({"facets": {"id": 1}, "data": [{"id": "a1"}, {"id": "b2"}]});
        assert_eq!(find_posts(&data).len(), 2);
    }

    #[test]
    fn finds_nested_listing_list() {
        let data = json!({"result": {"page": {"items": [{"canonical_path": "/listing/x-1"}]}}});
        assert_eq!(find_posts(&data).len(), 1);
    }

    #[test]
    fn skips_metadata_branches() {
        let data = json!({"metadata": {"title": "Closet"}, "summaries": [{"id": 3}]});
        assert!(find_posts(&data).is_empty());
    }

    #[test]
    fn maps_summary_fields() {
        let post = json!({
            "id": "68f06282f59cc4ded765a577",
            "title": "Blue Wrap Dress",
            "canonical_path": "/listing/Blue-Wrap-Dress-68f06282f59cc4ded765a577",
            "price_amount": {"val": "1,025", "currency_code": "USD"},
            "original_price_amount": {"val": "2000"},
            "size_obj": {"display": "M"},
            "brand": "Reformation",
            "condition": "nwt",
            "like_count": 14,
            "comment_count": "3"
        });
        let l = summary_from_post(&post, BASE).unwrap();
        assert_eq!(l.slug, "68f06282f59cc4ded765a577");
        assert_eq!(l.link, "https://poshmark.com/listing/Blue-Wrap-Dress-68f06282f59cc4ded765a577");
        assert_eq!(l.title, "Blue Wrap Dress");
        assert_eq!(l.price, "1025");
        assert_eq!(l.original_price, "2000");
        assert_eq!(l.size, "M");
        assert_eq!(l.brand, "Reformation");
        assert_eq!(l.condition, "NWT");
        assert_eq!(l.likes, 14);
        assert_eq!(l.comments, 3);
        assert!(l.description.is_empty());
    }

    #[test]
    fn builds_link_from_title_and_id() {
        let post = json!({"id": "abc123", "title": "Vintage Tee (L)!", "price": 20});
        let l = summary_from_post(&post, BASE).unwrap();
        assert_eq!(l.link, "https://poshmark.com/listing/Vintage-Tee-L-abc123");
        assert_eq!(l.slug, "abc123");
        assert_eq!(l.price, "20");
    }

    #[test]
    fn missing_fields_default() {
        let post = json!({"path": "/listing/Thing-ff00"});
        let l = summary_from_post(&post, BASE).unwrap();
        assert_eq!(l.likes, 0);
        assert!(l.brand.is_empty() && l.size.is_empty() && l.price.is_empty());
    }

    #[test]
    fn post_without_link_or_id_is_dropped() {
        assert!(summary_from_post(&json!({"title": "orphan"}), BASE).is_none());
    }
}
