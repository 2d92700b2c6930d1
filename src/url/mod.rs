//! URL handling module for Listing-Harvester
//!
//! This module provides listing URL construction (filters, sort order and
//! page numbers) and the link normalization used on extracted product
//! records.

mod listing;
mod normalize;

pub use listing::{
    page_number_from_url, parse_listing_url, ListingUrlBuilder, SortOrder, PAGE_PARAM,
};
pub use normalize::{absolutize_url, normalize_image_url};

use url::Url;

/// Returns the origin (`scheme://host[:port]`) of a URL as a base for joins
///
/// # Examples
///
/// ```
/// use listing_harvester::url::site_origin;
/// use url::Url;
///
/// let url = Url::parse("https://www.example.com/uk/items.aspx?page=2").unwrap();
/// assert_eq!(site_origin(&url).as_str(), "https://www.example.com/");
/// ```
pub fn site_origin(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}
