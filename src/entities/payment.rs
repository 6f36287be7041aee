use serde::{Deserialize, Serialize};

use crate::{
    endpoints::{FreshBooksEndpoint, Query},
    error::Result,
    utils::serde_helpers::optional_string_or_number,
    Client,
};

pub const DEFAULT_GATEWAY: &str = "stripe";

/// Online payment settings for an invoice, or the account defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentOptions {
    pub gateway_name: Option<String>,
    pub has_credit_card: bool,
    pub has_ach_transfer: bool,
    pub has_bacs_debit: bool,
    pub has_sepa_debit: bool,
    pub has_acss_debit: bool,
    pub has_paypal_smart_checkout: bool,
    pub allow_partial_payments: bool,
    pub entity_type: Option<String>,
    #[serde(deserialize_with = "optional_string_or_number")]
    pub entity_id: Option<String>,
}

// The payments API answers without the accounting `response` envelope.
#[derive(Deserialize)]
struct PaymentOptionsResponse {
    payment_options: PaymentOptions,
}

#[derive(Debug, Serialize)]
struct AddPaymentOption<'a> {
    gateway_name: &'a str,
    entity_id: i64,
    entity_type: &'a str,
    has_credit_card: bool,
}

/// The account's default payment options for invoices.
#[instrument(skip(client))]
pub async fn get_default_payment_options(client: &Client) -> Result<PaymentOptions> {
    let query = Query::new().param("entity_type", "invoice");
    let response: PaymentOptionsResponse =
        client.get(FreshBooksEndpoint::PaymentOptions, &query).await?;
    Ok(response.payment_options)
}

/// Enable credit card payments through `gateway_name` (Stripe by default) on an invoice.
#[instrument(skip(client))]
pub async fn add_payment_option_to_invoice(
    client: &Client,
    invoice_id: i64,
    gateway_name: Option<&str>,
) -> Result<PaymentOptions> {
    let data = AddPaymentOption {
        gateway_name: gateway_name.unwrap_or(DEFAULT_GATEWAY),
        entity_id: invoice_id,
        entity_type: "invoice",
        has_credit_card: true,
    };
    let response: PaymentOptionsResponse = client
        .post(FreshBooksEndpoint::InvoicePaymentOptions(invoice_id), &data)
        .await?;
    Ok(response.payment_options)
}
