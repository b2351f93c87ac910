use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::closet::parse::{absolutize, clean_price};
use crate::listing::{Field, FieldValue, Listing};

/// Tile containers tried in order; the first selector with matches wins.
const CARD_SELECTORS: [&str; 3] = ["div.tile", "div.card", "[data-et-prop-listing_id]"];
const CONDITION_KEYWORDS: [&str; 5] = ["NWT", "Flawed", "Play Condition", "New", "Used"];

struct CardField {
    field: Field,
    extract: fn(ElementRef<'_>) -> Option<FieldValue>,
}

const CARD_FIELDS: &[CardField] = &[
    CardField { field: Field::Title, extract: title },
    CardField { field: Field::Link, extract: link },
    CardField { field: Field::Price, extract: price },
    CardField { field: Field::OriginalPrice, extract: original_price },
    CardField { field: Field::Size, extract: size },
    CardField { field: Field::Brand, extract: brand },
    CardField { field: Field::Condition, extract: condition },
    CardField { field: Field::Likes, extract: likes },
    CardField { field: Field::Comments, extract: comments },
];

/// Summaries for every listing tile on a server-rendered closet page.
/// Tiles without a listing link are skipped; repeated links keep the first tile.
pub fn parse_grid(html: &str, base: &str) -> Vec<Listing> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for card in cards(&doc) {
        let mut listing = Listing::default();
        for f in CARD_FIELDS {
            if let Some(v) = (f.extract)(card) {
                listing.apply(f.field, v);
            }
        }
        if listing.link.is_empty() { continue; }
        listing.apply(Field::Link, FieldValue::Text(absolutize(&listing.link, base)));
        if seen.insert(listing.slug.clone()) {
            out.push(listing);
        }
    }
    out
}

/// Distinct `/listing/` paths anywhere in the page source.
pub fn listing_paths(html: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"/listing/[^"'<>\s]+"#).expect("static regex"));
    let mut seen = HashSet::new();
    re.find_iter(html)
        .map(|m| m.as_str().to_string())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn cards(doc: &Html) -> Vec<ElementRef<'_>> {
    for s in CARD_SELECTORS {
        let Ok(sel) = Selector::parse(s) else { continue };
        let found: Vec<_> = doc.select(&sel).collect();
        if !found.is_empty() { return found; }
    }
    Vec::new()
}

fn title_anchor(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    ["a[class*=title]", "a[href*=\"/listing/\"]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| card.select(&sel).next())
}

fn title(card: ElementRef<'_>) -> Option<FieldValue> {
    let text = collapse(&title_anchor(card)?.text().collect::<String>());
    (!text.is_empty()).then_some(FieldValue::Text(text))
}

fn link(card: ElementRef<'_>) -> Option<FieldValue> {
    let href = title_anchor(card)?.value().attr("href")?.trim();
    (!href.is_empty()).then(|| FieldValue::Text(href.to_string()))
}

fn price_amounts(card: ElementRef<'_>) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$([\d,]+(?:\.\d{2})?)").expect("static regex"));
    card.text()
        .flat_map(|t| re.captures_iter(t).map(|c| clean_price(&c[1])).collect::<Vec<_>>())
        .collect()
}

fn price(card: ElementRef<'_>) -> Option<FieldValue> {
    price_amounts(card).into_iter().next().map(FieldValue::Text)
}

fn original_price(card: ElementRef<'_>) -> Option<FieldValue> {
    price_amounts(card).into_iter().nth(1).map(FieldValue::Text)
}

fn size(card: ElementRef<'_>) -> Option<FieldValue> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)size:\s*(.*)").expect("static regex"));
    let mut texts = card.text().map(str::trim).filter(|t| !t.is_empty());
    while let Some(t) = texts.next() {
        if let Some(c) = re.captures(t) {
            let inline = c[1].trim();
            let value = if inline.is_empty() { texts.next()?.to_string() } else { inline.to_string() };
            return Some(FieldValue::Text(value));
        }
    }
    None
}

fn brand(card: ElementRef<'_>) -> Option<FieldValue> {
    let sel = Selector::parse("[class*=brand]").ok()?;
    card.select(&sel)
        .map(|e| collapse(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .map(FieldValue::Text)
}

fn condition(card: ElementRef<'_>) -> Option<FieldValue> {
    let text = card.text().collect::<Vec<_>>().join(" ");
    condition_patterns()
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map(|(k, _)| FieldValue::Text(k.to_string()))
}

fn likes(card: ElementRef<'_>) -> Option<FieldValue> {
    static RE: OnceLock<Regex> = OnceLock::new();
    count_before(card, RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*like").expect("static regex")))
}

fn comments(card: ElementRef<'_>) -> Option<FieldValue> {
    static RE: OnceLock<Regex> = OnceLock::new();
    count_before(card, RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*comment").expect("static regex")))
}

fn count_before(card: ElementRef<'_>, re: &Regex) -> Option<FieldValue> {
    let text = card.text().collect::<Vec<_>>().join(" ");
    let n = re.captures(&text)?[1].parse().ok()?;
    Some(FieldValue::Count(n))
}

// Whole-word matchers, in keyword priority order.
fn condition_patterns() -> &'static [(&'static str, Regex)] {
    static RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        CONDITION_KEYWORDS
            .iter()
            .map(|k| (*k, Regex::new(&format!(r"\b{}\b", regex::escape(k))).expect("static regex")))
            .collect()
    })
}

pub(crate) fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://poshmark.com";

    const PAGE: &str = r#"
    <html><body>
      <div class="tile">
        <a class="tile__title" href="/listing/Silk-Blouse-aa01">Silk Blouse</a>
        <span>$45</span> <span class="strike">$120</span>
        <a class="tile__details__pipe__size">Size: S</a>
        <a class="tile__details__pipe__brand">Equipment</a>
        <span class="condition-tag">NWT</span>
        <span>12 likes</span><span>3 comments</span>
      </div>
      <div class="tile">
        <a href="/listing/Denim-Jacket-bb02">Denim Jacket</a>
        <span>$1,200</span>
        <span>Size:</span><span>XL</span>
      </div>
      <div class="tile">
        <a class="tile__title" href="/listing/Silk-Blouse-aa01">Duplicate</a>
      </div>
      <div class="tile"><span>$5</span></div>
    </body></html>
    "#;

    #[test]
    fn extracts_full_card() {
        let got = parse_grid(PAGE, BASE);
        assert_eq!(got.len(), 2);
        let a = &got[0];
        assert_eq!(a.slug, "aa01");
        assert_eq!(a.link, "https://poshmark.com/listing/Silk-Blouse-aa01");
        assert_eq!(a.title, "Silk Blouse");
        assert_eq!(a.price, "45");
        assert_eq!(a.original_price, "120");
        assert_eq!(a.size, "S");
        assert_eq!(a.brand, "Equipment");
        assert_eq!(a.condition, "NWT");
        assert_eq!(a.likes, 12);
        assert_eq!(a.comments, 3);
    }

    #[test]
    fn sparse_card_defaults() {
        let got = parse_grid(PAGE, BASE);
        let b = &got[1];
        assert_eq!(b.title, "Denim Jacket");
        assert_eq!(b.price, "1200");
        assert_eq!(b.size, "XL");
        assert!(b.original_price.is_empty());
        assert!(b.brand.is_empty());
        assert!(b.condition.is_empty());
        assert_eq!(b.likes, 0);
    }

    #[test]
    fn no_tiles_yields_nothing() {
        assert!(parse_grid("<html><body><p>empty closet</p></body></html>", BASE).is_empty());
    }

    #[test]
    fn listing_paths_are_distinct() {
        let html = r#"<a href="/listing/A-01">a</a><a href="/listing/A-01">a</a><script>"/listing/B-02"</script>"#;
        assert_eq!(listing_paths(html), vec!["/listing/A-01".to_string(), "/listing/B-02".to_string()]);
    }

    #[test]
    fn condition_needs_whole_word() {
        let card = |text: &str| format!(r#"<div class="tile"><a href="/listing/Bag-c{0}">Bag</a><span>{text}</span></div>"#, text.len());
        let got = parse_grid(&card("Newport bag"), BASE);
        assert!(got[0].condition.is_empty());
        let got = parse_grid(&card("Brand New tags"), BASE);
        assert_eq!(got[0].condition, "New");
    }

    #[test]
    fn counts_read_across_cards() {
        let html = r#"
            <div class="tile"><a href="/listing/A-a1">A</a><span>4 Likes</span></div>
            <div class="tile"><a href="/listing/B-b2">B</a><span>7 comments</span></div>"#;
        let got = parse_grid(html, BASE);
        assert_eq!((got[0].likes, got[0].comments), (4, 0));
        assert_eq!((got[1].likes, got[1].comments), (0, 7));
    }
}
