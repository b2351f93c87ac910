use std::collections::HashMap;

use url::Url;

use crate::closet::parse::absolutize;

/// Size variant encoded in the image file name; higher is larger.
fn variant_rank(url: &str) -> u8 {
    match file_name(url) {
        n if n.starts_with("s_") => 1,
        n if n.starts_with("m_") => 2,
        n if n.starts_with("l_") => 3,
        _ => 4,
    }
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// The URL with the size prefix and query removed, shared by every variant of one image.
fn variant_key(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
    let bare = ["s_", "m_", "l_"].iter().find_map(|p| name.strip_prefix(p)).unwrap_or(name);
    format!("{}/{}", dir, bare)
}

/// Absolute, de-proxied form of an image reference. Inline `data:` images are dropped.
pub fn normalize(src: &str, base: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") { return None; }
    let abs = absolutize(src, base);
    Some(unwrap_proxy(&abs).unwrap_or(abs))
}

fn unwrap_proxy(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let inner = parsed.query_pairs().find(|(k, _)| k == "url")?.1.into_owned();
    (inner.starts_with("http://") || inner.starts_with("https://") || inner.starts_with("//"))
        .then(|| absolutize(&inner, ""))
}

/// Widest candidate of a `srcset` attribute. Density descriptors compare the same way.
pub fn widest_in_srcset(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|cand| {
            let mut parts = cand.split_whitespace();
            let url = parts.next()?;
            let width = parts
                .next()
                .and_then(|d| d.trim_end_matches(['w', 'x']).parse::<f64>().ok())
                .unwrap_or(0.0);
            Some((url.to_string(), width))
        })
        .fold(None, |best: Option<(String, f64)>, (u, w)| match best {
            Some((bu, bw)) if bw >= w => Some((bu, bw)),
            _ => Some((u, w)),
        })
        .map(|(u, _)| u)
}

/// Ordered, de-duplicated image URLs keeping the largest variant of each image.
pub fn collect<I>(candidates: I, base: &str) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, String> = HashMap::new();

    for raw in candidates {
        let Some(url) = normalize(&raw, base) else { continue };
        let key = variant_key(&url);
        match best.get(&key) {
            Some(current) if variant_rank(current) >= variant_rank(&url) => {}
            Some(_) => { best.insert(key, url); }
            None => {
                order.push(key.clone());
                best.insert(key, url);
            }
        }
    }
    order.into_iter().filter_map(|k| best.remove(&k)).collect()
}
