use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub mod client;
pub mod invoice;
pub mod line_item;
pub mod payment;

/// A monetary amount as FreshBooks represents it: `{"amount": "12.50", "code": "USD"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    #[serde(default)]
    pub code: Option<String>,
}

/// Paging fields that accompany every list result.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub per_page: u32,
    pub total: Option<u32>,
}

impl Pagination {
    #[must_use]
    pub fn is_last_page(&self) -> bool {
        self.page >= self.pages
    }
}

/// Decodes raw API records one by one so a bad record can be reported as-is.
pub(crate) fn reshape<T: DeserializeOwned>(entity: &str, records: Vec<Value>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| reshape_one(entity, record))
        .collect()
}

pub(crate) fn reshape_one<T: DeserializeOwned>(entity: &str, record: Value) -> Result<T> {
    T::deserialize(&record).map_err(|source| {
        error!(entity, "failed to reshape record: {source}");
        Error::InvalidField {
            entity: entity.to_string(),
            record: record.to_string(),
            source,
        }
    })
}
