//! Parsing of admin API request bodies.
//!
//! Bodies are read as loose JSON objects so that "field absent" and "field
//! present" stay distinguishable and every rejection carries the exact
//! message returned to the client.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use fnuc_core::{InventoryLevels, StockAdjustment};

use crate::db::items::NewItem;
use crate::error::ApiError;
use crate::services::inventory::ItemPatch;

/// Image used when a new item does not name one.
pub const DEFAULT_IMAGE: &str = "/static/uploads/placeholder.png";

/// Stock note used when an API-created item carries none.
pub const API_CREATE_NOTE: &str = "Created via API";

const REQUIRED_FIELDS: [&str; 5] = ["name", "price", "category", "details", "price_id"];

/// A rejected request body. The message is returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0} must be a non-negative integer")]
    NotNonNegative(&'static str),

    #[error("{0} must be an integer")]
    NotInteger(&'static str),

    #[error("price must be a non-negative number")]
    InvalidPrice,

    #[error("{0} must be a string")]
    NotText(&'static str),

    #[error("Provide either 'delta' or 'quantity' in payload")]
    NoAdjustment,
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// A validated `POST /admin/api/items` body.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub item: NewItem,
    pub levels: InventoryLevels,
    pub note: String,
}

/// Interpret raw bytes as a JSON object. An empty body is an empty object.
///
/// # Errors
///
/// Returns `PayloadError::NotAnObject` for anything but an object.
pub fn object(body: &[u8]) -> Result<Map<String, Value>, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(PayloadError::NotAnObject),
    }
}

fn text(body: &Map<String, Value>, field: &'static str) -> Result<Option<String>, PayloadError> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_owned())),
        Some(_) => Err(PayloadError::NotText(field)),
    }
}

fn price(body: &Map<String, Value>) -> Result<Option<Decimal>, PayloadError> {
    let parsed = match body.get("price") {
        None => return Ok(None),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        Some(_) => None,
    };
    parsed
        .filter(|p| !p.is_sign_negative())
        .map(Some)
        .ok_or(PayloadError::InvalidPrice)
}

/// An integer field; whole-valued numbers and numeric strings are accepted.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_negative(
    body: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<i32>, PayloadError> {
    body.get(field)
        .map(|value| {
            integer(value)
                .filter(|n| *n >= 0)
                .and_then(|n| i32::try_from(n).ok())
                .ok_or(PayloadError::NotNonNegative(field))
        })
        .transpose()
}

/// JSON truthiness: `0`, `""`, `null`, `[]` and `{}` are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn note(body: &Map<String, Value>) -> Option<String> {
    body.get("note")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
}

/// Validate an item creation body.
///
/// # Errors
///
/// Returns the first problem found; missing fields are reported together.
pub fn parse_create(body: &Map<String, Value>) -> Result<CreateRequest, PayloadError> {
    let mut missing: Vec<&'static str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| !body.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(PayloadError::MissingFields(missing));
    }

    let levels = InventoryLevels {
        stock_quantity: non_negative(body, "stock_quantity")?.unwrap_or(0),
        low_stock_threshold: non_negative(body, "low_stock_threshold")?.unwrap_or(0),
        is_published: body.get("is_published").is_none_or(truthy),
    };

    let item = NewItem {
        name: text(body, "name")?.unwrap_or_default(),
        price: price(body)?.unwrap_or_default(),
        category: text(body, "category")?.unwrap_or_default(),
        image: text(body, "image")?
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE.to_owned()),
        details: text(body, "details")?.unwrap_or_default(),
        price_id: text(body, "price_id")?.unwrap_or_default(),
    };

    Ok(CreateRequest {
        item,
        levels,
        note: note(body).unwrap_or_else(|| API_CREATE_NOTE.to_owned()),
    })
}

/// Validate a partial update body. Absent fields stay untouched.
///
/// # Errors
///
/// Returns the first invalid field.
pub fn parse_patch(body: &Map<String, Value>) -> Result<ItemPatch, PayloadError> {
    Ok(ItemPatch {
        name: text(body, "name")?,
        price: price(body)?,
        category: text(body, "category")?,
        details: text(body, "details")?,
        price_id: text(body, "price_id")?,
        image: text(body, "image")?,
        stock_quantity: non_negative(body, "stock_quantity")?,
        low_stock_threshold: non_negative(body, "low_stock_threshold")?,
        is_published: body.get("is_published").map(truthy),
        note: note(body),
    })
}

/// Validate a stock adjustment body. `delta` wins over `quantity`.
///
/// # Errors
///
/// Returns `NoAdjustment` when neither field is present, `NotInteger` when the
/// chosen one is not an integer.
pub fn parse_adjustment(
    body: &Map<String, Value>,
) -> Result<(StockAdjustment, Option<String>), PayloadError> {
    let adjustment = if let Some(delta) = body.get("delta") {
        StockAdjustment::Delta(integer(delta).ok_or(PayloadError::NotInteger("delta"))?)
    } else if let Some(quantity) = body.get("quantity") {
        StockAdjustment::Quantity(integer(quantity).ok_or(PayloadError::NotInteger("quantity"))?)
    } else {
        return Err(PayloadError::NoAdjustment);
    };
    Ok((adjustment, note(body)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn full() -> Map<String, Value> {
        map(json!({
            "name": "Redmi Note 9",
            "price": 199.9,
            "category": "Mobile",
            "details": "6.53 inch display<br>5020 mAh",
            "price_id": "price_1Hq2Kx"
        }))
    }

    #[test]
    fn test_object_rejects_non_objects() {
        assert_eq!(object(b"[1,2]"), Err(PayloadError::NotAnObject));
        assert_eq!(object(b"nope"), Err(PayloadError::NotAnObject));
        assert!(object(b"").unwrap().is_empty());
        assert!(object(br#"{"a":1}"#).is_ok());
    }

    #[test]
    fn test_missing_fields_are_sorted() {
        let err = parse_create(&map(json!({"name": "x", "category": "y"}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing fields: details, price, price_id");
    }

    #[test]
    fn test_create_defaults() {
        let request = parse_create(&full()).unwrap();
        assert_eq!(request.item.image, DEFAULT_IMAGE);
        assert_eq!(request.item.price, Decimal::new(1999, 1));
        assert_eq!(
            request.levels,
            InventoryLevels {
                stock_quantity: 0,
                low_stock_threshold: 0,
                is_published: true,
            }
        );
        assert_eq!(request.note, API_CREATE_NOTE);
    }

    #[test]
    fn test_create_explicit_levels_and_note() {
        let mut body = full();
        body.insert("stock_quantity".to_owned(), json!("12"));
        body.insert("low_stock_threshold".to_owned(), json!(3));
        body.insert("is_published".to_owned(), json!(0));
        body.insert("image".to_owned(), json!(""));
        body.insert("note".to_owned(), json!("Launch batch"));

        let request = parse_create(&body).unwrap();
        assert_eq!(request.levels.stock_quantity, 12);
        assert_eq!(request.levels.low_stock_threshold, 3);
        assert!(!request.levels.is_published);
        assert_eq!(request.item.image, DEFAULT_IMAGE);
        assert_eq!(request.note, "Launch batch");
    }

    #[test]
    fn test_negative_stock_is_rejected() {
        let mut body = full();
        body.insert("stock_quantity".to_owned(), json!(-1));
        assert_eq!(
            parse_create(&body).unwrap_err().to_string(),
            "stock_quantity must be a non-negative integer"
        );

        let err = parse_patch(&map(json!({"low_stock_threshold": "many"}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "low_stock_threshold must be a non-negative integer"
        );
    }

    #[test]
    fn test_price_validation() {
        assert_eq!(
            parse_patch(&map(json!({"price": -5}))),
            Err(PayloadError::InvalidPrice)
        );
        assert_eq!(
            parse_patch(&map(json!({"price": "12.50"}))).unwrap().price,
            Some(Decimal::new(1250, 2))
        );
    }

    #[test]
    fn test_patch_only_sets_present_fields() {
        let patch = parse_patch(&map(json!({"stock_quantity": 4, "is_published": "yes"}))).unwrap();
        assert_eq!(
            patch,
            ItemPatch {
                stock_quantity: Some(4),
                is_published: Some(true),
                ..ItemPatch::default()
            }
        );
    }

    #[test]
    fn test_adjustment_delta_wins() {
        let (adjustment, note) =
            parse_adjustment(&map(json!({"delta": -2, "quantity": 50, "note": "sold"}))).unwrap();
        assert_eq!(adjustment, StockAdjustment::Delta(-2));
        assert_eq!(note.as_deref(), Some("sold"));

        let (adjustment, note) = parse_adjustment(&map(json!({"quantity": 7}))).unwrap();
        assert_eq!(adjustment, StockAdjustment::Quantity(7));
        assert_eq!(note, None);
    }

    #[test]
    fn test_adjustment_errors() {
        assert_eq!(
            parse_adjustment(&map(json!({"note": "x"}))).unwrap_err().to_string(),
            "Provide either 'delta' or 'quantity' in payload"
        );
        assert_eq!(
            parse_adjustment(&map(json!({"delta": 1.5}))).unwrap_err().to_string(),
            "delta must be an integer"
        );
        assert_eq!(
            parse_adjustment(&map(json!({"quantity": "lots"})))
                .unwrap_err()
                .to_string(),
            "quantity must be an integer"
        );
    }
}
