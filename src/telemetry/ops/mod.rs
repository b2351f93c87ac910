pub mod scrape;
pub mod invoke;
pub mod inspect;
