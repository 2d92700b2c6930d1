//! Listing URL construction
//!
//! The listing is addressed by a base URL plus optional filter parameters
//! (`minPrice`, `maxPrice`, `sort`) and a `page` parameter. Filters are only
//! added when the caller's URL does not already carry them, so a hand-crafted
//! start URL always wins over configuration.

use crate::{UrlError, UrlResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Query parameter carrying the page number
pub const PAGE_PARAM: &str = "page";

const MIN_PRICE_PARAM: &str = "minPrice";
const MAX_PRICE_PARAM: &str = "maxPrice";
const SORT_PARAM: &str = "sort";

/// Requested listing order
///
/// Known values map to the site's query tokens; anything else is passed
/// through literally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum SortOrder {
    /// Site default ordering, no `sort` parameter is added
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    NewIn,
    /// Unrecognized value, used verbatim as the query token
    Other(String),
}

impl SortOrder {
    /// Returns the query token for this order, or None for the site default
    pub fn query_token(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::PriceAsc => Some("price-asc"),
            Self::PriceDesc => Some("price-desc"),
            Self::NewIn => Some("new-in"),
            Self::Other(token) => Some(token.as_str()),
        }
    }
}

impl From<String> for SortOrder {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" | "default" => Self::Default,
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "new" => Self::NewIn,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for SortOrder {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_token().unwrap_or("default"))
    }
}

/// Parses a listing URL, accepting only absolute http(s) URLs with a host
pub fn parse_listing_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    Ok(url)
}

/// Reads the page number from a listing URL's `page` parameter
///
/// Missing, unparseable or zero values yield page 1.
pub fn page_number_from_url(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

/// Builds listing page URLs from a base URL and the configured filters
#[derive(Debug, Clone)]
pub struct ListingUrlBuilder {
    base: Url,
    min_price: Option<f64>,
    max_price: Option<f64>,
    sort: SortOrder,
}

impl ListingUrlBuilder {
    /// Creates a builder with no filters
    pub fn new(base: Url) -> Self {
        Self {
            base,
            min_price: None,
            max_price: None,
            sort: SortOrder::Default,
        }
    }

    /// Sets the price filters. Zero or negative values count as unset.
    pub fn with_price_range(mut self, min_price: Option<f64>, max_price: Option<f64>) -> Self {
        self.min_price = min_price.filter(|v| *v > 0.0);
        self.max_price = max_price.filter(|v| *v > 0.0);
        self
    }

    /// Sets the listing order
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// The base URL as supplied by the caller
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds the URL for the given page
    ///
    /// Filters are merged into the query only if the base URL does not
    /// already carry them. The `page` parameter is only written for pages
    /// after the first, replacing any existing value.
    ///
    /// # Examples
    ///
    /// ```
    /// use listing_harvester::url::{ListingUrlBuilder, SortOrder};
    /// use url::Url;
    ///
    /// let base = Url::parse("https://shop.example.com/items.aspx").unwrap();
    /// let builder = ListingUrlBuilder::new(base)
    ///     .with_price_range(Some(100.0), None)
    ///     .with_sort(SortOrder::PriceAsc);
    ///
    /// assert_eq!(
    ///     builder.build(2).as_str(),
    ///     "https://shop.example.com/items.aspx?minPrice=100&sort=price-asc&page=2"
    /// );
    /// ```
    pub fn build(&self, page: u32) -> Url {
        let mut url = self.base.clone();

        let present: HashSet<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        let mut additions: Vec<(&str, String)> = Vec::new();

        if let Some(min) = self.min_price {
            if !present.contains(MIN_PRICE_PARAM) {
                additions.push((MIN_PRICE_PARAM, min.to_string()));
            }
        }
        if let Some(max) = self.max_price {
            if !present.contains(MAX_PRICE_PARAM) {
                additions.push((MAX_PRICE_PARAM, max.to_string()));
            }
        }
        if let Some(token) = self.sort.query_token() {
            if !present.contains(SORT_PARAM) {
                additions.push((SORT_PARAM, token.to_string()));
            }
        }

        if !additions.is_empty() {
            url.query_pairs_mut().extend_pairs(additions);
        }

        if page > 1 {
            set_query_param(&mut url, PAGE_PARAM, &page.to_string());
        }

        url
    }
}

/// Replaces (or appends) a single query parameter, keeping the others in order
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(key, value);
}
