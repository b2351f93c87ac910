use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::closet::grid::collapse;
use crate::detail::images;
use crate::listing::{Field, FieldValue};

/// A parsed listing page together with its JSON-LD `Product` block, if any.
pub struct DetailPage {
    doc: Html,
    ld: Option<Value>,
    base: String,
}

impl DetailPage {
    pub fn parse(html: &str, base: &str) -> Self {
        let doc = Html::parse_document(html);
        let ld = product_ld(&doc);
        DetailPage { doc, ld, base: base.to_string() }
    }

    fn first(&self, selectors: &[&str]) -> Option<ElementRef<'_>> {
        selectors
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|sel| self.doc.select(&sel).next())
    }

    fn all(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(sel) => self.doc.select(&sel).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn first_text(&self, selectors: &[&str]) -> Option<String> {
        let text = collapse(&self.first(selectors)?.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    }

    fn ld_str(&self, path: &[&str]) -> Option<String> {
        let mut cur = self.ld.as_ref()?;
        for key in path {
            cur = cur.get(*key)?;
        }
        match cur {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn ld_offer(&self) -> Option<&Value> {
        match self.ld.as_ref()?.get("offers")? {
            Value::Array(items) => items.first(),
            v => Some(v),
        }
    }
}

struct PageField {
    field: Field,
    extract: fn(&DetailPage) -> Option<FieldValue>,
}

const DETAIL_FIELDS: &[PageField] = &[
    PageField { field: Field::Name, extract: name },
    PageField { field: Field::Description, extract: description },
    PageField { field: Field::Images, extract: image_urls },
    PageField { field: Field::Category, extract: category },
    PageField { field: Field::Seller, extract: seller },
    PageField { field: Field::Shares, extract: shares },
    PageField { field: Field::Tags, extract: tags },
    PageField { field: Field::Availability, extract: availability },
    PageField { field: Field::Shipping, extract: shipping },
];

/// Every detail field the page yields, in table order.
pub fn extract(page: &DetailPage) -> Vec<(Field, FieldValue)> {
    DETAIL_FIELDS
        .iter()
        .filter_map(|f| (f.extract)(page).map(|v| (f.field, v)))
        .collect()
}

fn name(p: &DetailPage) -> Option<FieldValue> {
    p.first_text(&["h1[class*=listing__title-container]", "h1[class*=listing__title]"])
        .or_else(|| p.ld_str(&["name"]))
        .map(FieldValue::Text)
}

fn description(p: &DetailPage) -> Option<FieldValue> {
    // Line breaks are kept; only the outer whitespace goes.
    let from_markup = p
        .first(&["div[class*=listing__description]"])
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    from_markup.or_else(|| p.ld_str(&["description"])).map(FieldValue::Text)
}

fn image_urls(p: &DetailPage) -> Option<FieldValue> {
    let mut raw: Vec<String> = Vec::new();
    for el in p.all("[class*=listing__image] img, [class*=carousel] img, [class*=slideshow] img, [class*=covershot] img") {
        let v = el.value();
        if let Some(best) = v.attr("srcset").or(v.attr("data-srcset")).and_then(images::widest_in_srcset) {
            raw.push(best);
        }
        for attr in ["data-src", "src"] {
            if let Some(src) = v.attr(attr) {
                raw.push(src.to_string());
            }
        }
    }
    if raw.is_empty() {
        raw = match p.ld.as_ref().and_then(|ld| ld.get("image")) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };
    }
    let urls = images::collect(raw, &p.base);
    (!urls.is_empty()).then_some(FieldValue::List(urls))
}

fn category(p: &DetailPage) -> Option<FieldValue> {
    let crumbs: Vec<String> = p
        .all("[class*=listing__breadcrumbs] a, [class*=breadcrumb] a")
        .into_iter()
        .map(|a| collapse(&a.text().collect::<String>()))
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("home"))
        .collect();
    if !crumbs.is_empty() {
        return Some(FieldValue::Text(crumbs.join(" > ")));
    }
    p.ld_str(&["category"]).map(FieldValue::Text)
}

fn seller(p: &DetailPage) -> Option<FieldValue> {
    if let Some(name) = p.first_text(&["[class*=listing__user-name]"]) {
        return Some(FieldValue::Text(name.trim_start_matches('@').to_string()));
    }
    p.first(&["a[href^=\"/closet/\"]"])
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| href.trim_start_matches("/closet/").split(['/', '?']).next().map(str::to_string))
        .filter(|s| !s.is_empty())
        .map(FieldValue::Text)
}

fn shares(p: &DetailPage) -> Option<FieldValue> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*shares?\b").expect("static regex"));
    let body = p.all("body").first().map(|b| b.text().collect::<Vec<_>>().join(" "))?;
    let n = re.captures(&body)?[1].parse().ok()?;
    Some(FieldValue::Count(n))
}

fn tags(p: &DetailPage) -> Option<FieldValue> {
    let mut seen = HashSet::new();
    let tags: Vec<String> = p
        .all("[class*=listing__tags] a")
        .into_iter()
        .map(|a| collapse(&a.text().collect::<String>()).trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect();
    (!tags.is_empty()).then_some(FieldValue::List(tags))
}

fn availability(p: &DetailPage) -> Option<FieldValue> {
    if let Some(s) = p.first_text(&["[class*=listing__status]", "[class*=inventory-status]"]) {
        return Some(FieldValue::Text(s));
    }
    let raw = p.ld_offer()?.get("availability")?.as_str()?;
    // schema.org values arrive as URLs; keep the final segment.
    let short = raw.rsplit('/').next().unwrap_or(raw).trim();
    (!short.is_empty()).then(|| FieldValue::Text(short.to_string()))
}

fn shipping(p: &DetailPage) -> Option<FieldValue> {
    if let Some(s) = p.first_text(&["[class*=listing__shipping]", "[class*=shipping-info]"]) {
        return Some(FieldValue::Text(s));
    }
    let details = p.ld_offer()?.get("shippingDetails")?;
    let details = match details {
        Value::Array(items) => items.first()?,
        v => v,
    };
    let rate = details.get("shippingRate")?;
    let value = rate.get("value").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })?;
    let currency = rate.get("currency").and_then(Value::as_str).unwrap_or("");
    Some(FieldValue::Text(format!("{} {}", value, currency).trim().to_string()))
}

fn product_ld(doc: &Html) -> Option<Value> {
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    doc.select(&sel)
        .filter_map(|s| serde_json::from_str::<Value>(&s.text().collect::<String>()).ok())
        .find_map(|v| find_product(&v, 0))
}

fn find_product(v: &Value, depth: usize) -> Option<Value> {
    if depth > 4 { return None; }
    match v {
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product",
                Some(Value::Array(ts)) => ts.iter().any(|t| t == "Product"),
                _ => false,
            };
            if is_product {
                return Some(v.clone());
            }
            map.get("@graph").and_then(|g| find_product(g, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|i| find_product(i, depth + 1)),
        _ => None,
    }
}
