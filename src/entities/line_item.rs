use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::Money;
use crate::utils::serde_helpers::null_as_default;

/// A line as it arrives from the API, before the parent invoice's ids are attached.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RawLineItem {
    #[serde(rename = "lineid")]
    pub line_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub qty: Decimal,
    pub unit_cost: Money,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub invoice_id: i64,
    pub client_id: i64,
    pub line_id: i64,
    pub name: String,
    pub description: String,
    /// Unit cost.
    pub rate: Decimal,
    pub quantity: Decimal,
    pub amount: Decimal,
}

impl LineItem {
    pub(crate) fn from_raw(raw: RawLineItem, invoice_id: i64, client_id: i64) -> Self {
        Self {
            invoice_id,
            client_id,
            line_id: raw.line_id,
            name: raw.name,
            description: raw.description,
            rate: raw.unit_cost.amount,
            quantity: raw.qty,
            amount: raw.amount.amount,
        }
    }

    /// The writable fields of this line, e.g. to copy it onto another invoice.
    #[must_use]
    pub fn into_builder(self) -> Builder {
        Builder::new(self.name, self.description, self.rate, self.quantity)
    }
}

/// A line to write when creating or updating an invoice. Amounts travel as strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Builder {
    pub name: String,
    pub description: String,
    pub unit_cost: String,
    pub qty: String,
}

impl Builder {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit_cost: Decimal,
        qty: Decimal,
    ) -> Self {
        Builder {
            name: name.into(),
            description: description.into(),
            unit_cost: unit_cost.to_string(),
            qty: qty.to_string(),
        }
    }
}
