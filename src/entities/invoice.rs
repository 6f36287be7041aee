use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use time::Date;

use crate::{
    endpoints::{FreshBooksEndpoint, Query},
    entities::{
        line_item::{self, LineItem, RawLineItem},
        reshape_one, Money, Pagination,
    },
    error::{Error, Result},
    utils::{
        date_format::{freshbooks_date, today},
        serde_helpers::{empty_string_as_none, null_as_default},
    },
    Client,
};

const ENTITY: &str = "Invoice";
const INCLUDES: [&str; 3] = ["lines", "contacts", "allowed_gateways"];

/// The `v3_status` of an invoice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Draft,
    Sent,
    Viewed,
    Failed,
    Retry,
    Paid,
    #[serde(rename = "auto-paid", alias = "autopaid")]
    AutoPaid,
    Partial,
    Disputed,
    Resubmitted,
    Overdue,
    Outstanding,
    Pending,
    Declined,
    #[serde(other)]
    Unknown,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Failed => "failed",
            Self::Retry => "retry",
            Self::Paid => "paid",
            Self::AutoPaid => "auto-paid",
            Self::Partial => "partial",
            Self::Disputed => "disputed",
            Self::Resubmitted => "resubmitted",
            Self::Overdue => "overdue",
            Self::Outstanding => "outstanding",
            Self::Pending => "pending",
            Self::Declined => "declined",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The numeric status sent when creating an invoice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateStatus {
    Draft,
    Paid,
    Code(u8),
}

impl CreateStatus {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Draft => 1,
            Self::Paid => 4,
            Self::Code(code) => code,
        }
    }
}

impl TryFrom<Status> for CreateStatus {
    type Error = Error;

    fn try_from(status: Status) -> Result<Self> {
        match status {
            Status::Draft => Ok(Self::Draft),
            Status::Paid => Ok(Self::Paid),
            other => Err(Error::InvalidArgument(format!(
                "invoices can only be created as draft or paid, not {other}"
            ))),
        }
    }
}

impl Serialize for CreateStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A contact an invoice is addressed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceContact {
    #[serde(rename = "contactid", default)]
    pub contact_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(rename = "fname", default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(rename = "lname", default, deserialize_with = "null_as_default")]
    pub last_name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct RawInvoice {
    id: i64,
    #[serde(rename = "customerid")]
    client_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    notes: String,
    #[serde(with = "freshbooks_date")]
    create_date: Date,
    #[serde(default, deserialize_with = "null_as_default")]
    invoice_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    organization: String,
    amount: Money,
    outstanding: Money,
    v3_status: Status,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    po_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    lines: Vec<RawLineItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    contacts: Vec<InvoiceContact>,
    #[serde(default, deserialize_with = "null_as_default")]
    allowed_gateways: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "RawInvoice")]
pub struct Invoice {
    pub invoice_id: i64,
    pub client_id: i64,
    pub number: String,
    pub organization: String,
    pub notes: String,
    pub date: Date,
    pub amount: Decimal,
    pub amount_outstanding: Decimal,
    pub status: Status,
    pub po_number: Option<String>,
    pub lines: Vec<LineItem>,
    pub contacts: Vec<InvoiceContact>,
    pub allowed_gateways: Vec<Value>,
}

impl From<RawInvoice> for Invoice {
    fn from(raw: RawInvoice) -> Self {
        let lines = raw
            .lines
            .into_iter()
            .map(|line| LineItem::from_raw(line, raw.id, raw.client_id))
            .collect();
        Self {
            invoice_id: raw.id,
            client_id: raw.client_id,
            number: raw.invoice_number,
            organization: raw.organization,
            notes: raw.notes,
            date: raw.create_date,
            amount: raw.amount.amount,
            amount_outstanding: raw.outstanding.amount,
            status: raw.v3_status,
            po_number: raw.po_number,
            lines,
            contacts: raw.contacts,
            allowed_gateways: raw.allowed_gateways,
        }
    }
}

impl Invoice {
    #[must_use]
    pub fn line(&self, line_id: i64) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    #[must_use]
    pub fn line_by_description(&self, description: &str) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.description == description)
    }

    #[must_use]
    pub fn line_id_for_description(&self, description: &str) -> Option<i64> {
        self.line_by_description(description).map(|l| l.line_id)
    }

    #[must_use]
    pub fn contact(&self, email: &str) -> Option<&InvoiceContact> {
        self.contacts.iter().find(|c| c.email == email)
    }
}

/// Which client's invoices to list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientFilter {
    Id(i64),
    /// Matched exactly against the invoice's current organization name.
    OrgName(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParameters {
    pub client: Option<ClientFilter>,
    pub status: Option<Status>,
}

impl ListParameters {
    #[must_use]
    pub fn for_client_id(client_id: i64) -> Self {
        Self {
            client: Some(ClientFilter::Id(client_id)),
            status: None,
        }
    }

    #[must_use]
    pub fn for_org_name(org_name: &str) -> Self {
        Self {
            client: Some(ClientFilter::OrgName(org_name.to_string())),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    fn search_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(ClientFilter::Id(client_id)) = &self.client {
            query = query.search("customerid", client_id);
        }
        if let Some(status) = self.status {
            query = query.search("v3_status", status);
        }
        query
    }

    fn org_name(&self) -> Option<&str> {
        match &self.client {
            Some(ClientFilter::OrgName(name)) => Some(name),
            _ => None,
        }
    }
}

/// A contact to address a new invoice to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ContactRef {
    #[serde(rename = "contactid")]
    pub contact_id: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InvoiceBuilder {
    #[serde(rename = "customerid")]
    pub client_id: i64,
    pub notes: String,
    pub status: CreateStatus,
    pub lines: Vec<line_item::Builder>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ContactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(with = "freshbooks_date")]
    pub create_date: Date,
    pub allowed_gateway_name: String,
}

impl InvoiceBuilder {
    /// A new invoice dated today with Stripe as the allowed gateway.
    #[must_use]
    pub fn new(client_id: i64, status: CreateStatus) -> Self {
        Self {
            client_id,
            notes: String::new(),
            status,
            lines: Vec::new(),
            contacts: Vec::new(),
            po_number: None,
            create_date: today(),
            allowed_gateway_name: "Stripe".to_string(),
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn line(mut self, line: line_item::Builder) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use]
    pub fn contact(mut self, contact_id: i64) -> Self {
        self.contacts.push(ContactRef { contact_id });
        self
    }

    #[must_use]
    pub fn po_number(mut self, po_number: impl Into<String>) -> Self {
        self.po_number = Some(po_number.into());
        self
    }

    #[must_use]
    pub fn create_date(mut self, create_date: Date) -> Self {
        self.create_date = create_date;
        self
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    invoices: Vec<Value>,
    #[serde(flatten)]
    pagination: Pagination,
}

#[derive(Deserialize)]
struct SingleResponse {
    invoice: Value,
}

fn with_includes(mut query: Query) -> Query {
    for relation in INCLUDES {
        query = query.include(relation);
    }
    query
}

/// List invoices.
///
/// A first request learns the total so the second can fetch every match in one page.
#[instrument(skip(client))]
pub async fn list(client: &Client, parameters: &ListParameters) -> Result<Vec<Invoice>> {
    let filters = parameters.search_query();
    let probe: ListResponse = client.get(FreshBooksEndpoint::Invoices, &filters).await?;

    let query = match probe.pagination.total {
        Some(0) => return Ok(Vec::new()),
        Some(total) => with_includes(filters.param("per_page", total)),
        None => with_includes(filters),
    };
    let response: ListResponse = client.get(FreshBooksEndpoint::Invoices, &query).await?;

    let org_name = parameters.org_name();
    let invoices = response
        .invoices
        .into_iter()
        .filter(|record| {
            org_name.is_none_or(|name| {
                record.get("current_organization").and_then(Value::as_str) == Some(name)
            })
        })
        .map(|record| reshape_one(ENTITY, record))
        .collect::<Result<Vec<Invoice>>>()?;
    debug!("found {} invoices", invoices.len());
    Ok(invoices)
}

/// Get a single invoice by id.
#[instrument(skip(client))]
pub async fn get(client: &Client, invoice_id: i64) -> Result<Invoice> {
    let query = with_includes(Query::new());
    let response: SingleResponse = client
        .get(FreshBooksEndpoint::Invoice(invoice_id), &query)
        .await?;
    reshape_one(ENTITY, response.invoice)
}

/// Create a new invoice.
#[instrument(skip(client, builder))]
pub async fn create(client: &Client, builder: &InvoiceBuilder) -> Result<Invoice> {
    let response: SingleResponse = client
        .post(FreshBooksEndpoint::Invoices, &json!({ "invoice": builder }))
        .await?;
    reshape_one(ENTITY, response.invoice)
}

/// Update an invoice. `fields` is sent as the body's `invoice` object.
#[instrument(skip(client, fields))]
pub async fn update<T: Serialize + fmt::Debug>(
    client: &Client,
    invoice_id: i64,
    fields: &T,
) -> Result<Invoice> {
    let response: SingleResponse = client
        .put(FreshBooksEndpoint::Invoice(invoice_id), &json!({ "invoice": fields }))
        .await?;
    reshape_one(ENTITY, response.invoice)
}

/// Hide an invoice.
#[instrument(skip(client))]
pub async fn delete(client: &Client, invoice_id: i64) -> Result<Invoice> {
    update(client, invoice_id, &json!({ "vis_state": 1 })).await
}

/// Email the invoice to its contacts.
#[instrument(skip(client))]
pub async fn send(client: &Client, invoice_id: i64) -> Result<Invoice> {
    update(client, invoice_id, &json!({ "action_email": true })).await
}
