use std::path::Path;

use crate::listing::Listing;

use super::SinkError;

const HEADER: [&str; 20] = [
    "slug", "title", "price", "original_price", "size", "brand", "condition", "likes", "comments", "link",
    "name", "description", "images", "category", "seller", "shares", "tags", "availability", "shipping", "scraped_at",
];

fn row(l: &Listing) -> [String; 20] {
    [
        l.slug.clone(),
        l.title.clone(),
        l.price.clone(),
        l.original_price.clone(),
        l.size.clone(),
        l.brand.clone(),
        l.condition.clone(),
        l.likes.to_string(),
        l.comments.to_string(),
        l.link.clone(),
        l.name.clone(),
        l.description.clone(),
        l.images.join("|"),
        l.category.clone(),
        l.seller.clone(),
        l.shares.to_string(),
        l.tags.join("|"),
        l.availability.clone(),
        l.shipping.clone(),
        l.scraped_at.clone(),
    ]
}

/// One row per listing with list fields `|`-joined. Nothing is written for an
/// empty run; returns whether a file was produced.
pub fn write_csv(path: &Path, listings: &[Listing]) -> Result<bool, SinkError> {
    if listings.is_empty() {
        return Ok(false);
    }
    let err = |e: csv::Error| SinkError::Csv { path: path.to_path_buf(), source: e };
    let mut w = csv::WriterBuilder::new().from_path(path).map_err(err)?;
    w.write_record(HEADER).map_err(err)?;
    for l in listings {
        w.write_record(row(l)).map_err(err)?;
    }
    w.flush().map_err(|e| SinkError::Io { path: path.to_path_buf(), source: e })?;
    Ok(true)
}
