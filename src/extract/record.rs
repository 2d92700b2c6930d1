use crate::extract::RawProductRecord;
use crate::url::{absolutize_url, normalize_image_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A product record in its published shape
///
/// Invariant: `discount` is non-empty iff `price < original_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProductRecord {
    /// Unique key within a crawl run
    pub product_id: String,
    pub brand: Option<String>,
    pub title: Option<String>,

    /// Price actually charged (sale price when on sale)
    pub price: Option<f64>,

    /// List price
    pub original_price: Option<f64>,
    pub currency: Option<String>,

    /// Percentage label such as `"20%"`, empty when not on sale
    pub discount: String,

    /// Absolute product page URL
    pub product_url: Option<String>,

    /// Absolute image URL without query string
    pub image_url: Option<String>,
    pub stock_level: Option<i64>,
    pub in_stock: bool,
    pub designer_id: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl CanonicalProductRecord {
    /// Maps a raw listing item into the canonical shape
    ///
    /// This never fails: missing fields stay missing, a missing id becomes
    /// an empty `product_id` and a missing stock flag reads as out of stock.
    pub fn from_raw(raw: &RawProductRecord, origin: &Url, scraped_at: DateTime<Utc>) -> Self {
        let list_price = raw.list_price;
        let sale_price = raw.current_price.filter(|p| *p > 0.0);

        let on_sale = matches!((sale_price, list_price), (Some(s), Some(l)) if s < l);
        let price = match (sale_price, list_price) {
            (Some(s), _) if on_sale => Some(s),
            (_, Some(l)) => Some(l),
            (s, None) => s,
        };

        Self {
            product_id: raw.id.clone().unwrap_or_default(),
            brand: raw.brand.clone(),
            title: raw.title.clone(),
            price,
            original_price: list_price,
            currency: raw.currency_code.clone(),
            discount: discount_label(sale_price, list_price),
            product_url: raw
                .product_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| absolutize_url(u, origin)),
            image_url: normalize_image_url(raw.image_url.as_deref()),
            stock_level: raw.stock_level,
            in_stock: raw.in_stock.unwrap_or(false),
            designer_id: raw.brand_id.clone(),
            scraped_at,
        }
    }

    /// Returns true when the record carries a sale price below list
    pub fn is_discounted(&self) -> bool {
        !self.discount.is_empty()
    }
}

/// Formats the sale discount as a whole percentage of the list price
///
/// Empty unless the sale price is strictly below a positive list price.
pub fn discount_label(sale_price: Option<f64>, list_price: Option<f64>) -> String {
    match (sale_price, list_price) {
        (Some(sale), Some(list)) if list > 0.0 && sale < list => {
            let percent = ((list - sale) / list * 100.0).round() as i64;
            format!("{}%", percent)
        }
        _ => String::new(),
    }
}

/// Normalizes raw records for one site
#[derive(Debug, Clone)]
pub struct Normalizer {
    origin: Url,
}

impl Normalizer {
    /// Creates a normalizer resolving relative links against `origin`
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Normalizes a record stamped with the current time
    pub fn normalize(&self, raw: &RawProductRecord) -> CanonicalProductRecord {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalizes a record with an explicit timestamp
    pub fn normalize_at(
        &self,
        raw: &RawProductRecord,
        scraped_at: DateTime<Utc>,
    ) -> CanonicalProductRecord {
        CanonicalProductRecord::from_raw(raw, &self.origin, scraped_at)
    }
}
