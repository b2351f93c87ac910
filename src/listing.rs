use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on the sanitized-path form of a slug.
const MAX_SLUG_LEN: usize = 100;

/// One closet item. Summary fields come from the closet page; detail fields
/// stay at their defaults unless the listing page was fetched and parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub slug: String,
    pub title: String,
    pub price: String,
    pub original_price: String,
    pub size: String,
    pub brand: String,
    pub condition: String,
    pub likes: u32,
    pub comments: u32,
    pub link: String,

    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub seller: String,
    #[serde(default)]
    pub shares: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub shipping: String,
    #[serde(default)]
    pub scraped_at: String,
}

impl Listing {
    /// Build a summary record for `link`, deriving the slug from it.
    pub fn from_link(link: impl Into<String>) -> Self {
        let link = link.into();
        Listing { slug: slug_from_url(&link), link, ..Default::default() }
    }

    pub fn has_details(&self) -> bool {
        !self.description.is_empty() || !self.images.is_empty() || !self.seller.is_empty()
    }
}

/// Listing attributes that markup extractors can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Link,
    Price,
    OriginalPrice,
    Size,
    Brand,
    Condition,
    Likes,
    Comments,
    Name,
    Description,
    Images,
    Category,
    Seller,
    Shares,
    Tags,
    Availability,
    Shipping,
}

/// A value produced by one extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Count(u32),
    List(Vec<String>),
}

impl Listing {
    /// Store an extracted value. A value of the wrong shape for the field is ignored.
    pub fn apply(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Likes, FieldValue::Count(n)) => self.likes = n,
            (Field::Comments, FieldValue::Count(n)) => self.comments = n,
            (Field::Shares, FieldValue::Count(n)) => self.shares = n,
            (Field::Images, FieldValue::List(v)) => self.images = v,
            (Field::Tags, FieldValue::List(v)) => self.tags = v,
            (Field::Link, FieldValue::Text(s)) => {
                self.slug = slug_from_url(&s);
                self.link = s;
            }
            (field, FieldValue::Text(s)) => {
                let slot = match field {
                    Field::Title => &mut self.title,
                    Field::Price => &mut self.price,
                    Field::OriginalPrice => &mut self.original_price,
                    Field::Size => &mut self.size,
                    Field::Brand => &mut self.brand,
                    Field::Condition => &mut self.condition,
                    Field::Name => &mut self.name,
                    Field::Description => &mut self.description,
                    Field::Category => &mut self.category,
                    Field::Seller => &mut self.seller,
                    Field::Availability => &mut self.availability,
                    Field::Shipping => &mut self.shipping,
                    _ => return,
                };
                *slot = s;
            }
            _ => {}
        }
    }
}

fn trailing_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-([a-f0-9]+)$").expect("static regex"))
}

fn unsafe_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("static regex"))
}

/// Derive the stable listing identifier from a listing URL or path.
///
/// `/listing/Blue-Dress-68f06282f59cc4ded765a577` yields the trailing hex id;
/// anything else falls back to a filename-safe form of the path.
pub fn slug_from_url(link: &str) -> String {
    let path = match Url::parse(link) {
        Ok(u) => u.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let path = path.trim_matches('/');

    if let Some(caps) = trailing_id_re().captures(path) {
        return caps[1].to_string();
    }

    let sanitized = unsafe_chars_re().replace_all(path, "_");
    sanitized.chars().take(MAX_SLUG_LEN).collect()
}
