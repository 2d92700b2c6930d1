use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One listing item as it appears in the hydrated page state
///
/// Field names follow the listing's own JSON keys. Every field is optional
/// and loosely typed: ids may arrive as numbers or strings, prices as numbers
/// or numeric strings. A field of an unexpected type reads as `None` instead
/// of rejecting the item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawProductRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,

    #[serde(rename = "designerName", deserialize_with = "lenient_string")]
    pub brand: Option<String>,

    #[serde(rename = "name", deserialize_with = "lenient_string")]
    pub title: Option<String>,

    /// Sale price, only meaningful when lower than the list price
    #[serde(rename = "unitSalePrice", deserialize_with = "lenient_f64")]
    pub current_price: Option<f64>,

    #[serde(rename = "unitPrice", deserialize_with = "lenient_f64")]
    pub list_price: Option<f64>,

    #[serde(rename = "currencyCode", deserialize_with = "lenient_string")]
    pub currency_code: Option<String>,

    #[serde(rename = "url", deserialize_with = "lenient_string")]
    pub product_url: Option<String>,

    /// Possibly scheme-relative and carrying resize parameters
    #[serde(rename = "imageUrl", deserialize_with = "lenient_string")]
    pub image_url: Option<String>,

    #[serde(rename = "stock", deserialize_with = "lenient_i64")]
    pub stock_level: Option<i64>,

    #[serde(rename = "hasStock", deserialize_with = "lenient_bool")]
    pub in_stock: Option<bool>,

    #[serde(rename = "designerId", deserialize_with = "string_or_number")]
    pub brand_id: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}
