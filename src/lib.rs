//! # freshbooks-rs
//!
//! A Rust client library for the FreshBooks API: clients and their contacts,
//! invoices, and invoice payment options.
//!
//! The [`Client`] owns the OAuth 2 token lifecycle. Tokens are loaded from a
//! [`token::TokenStore`] (a JSON file by default), refreshed when they expire and
//! written back after every exchange.
//!
//! ```ignore
//! let client = freshbooks_rs::Client::from_env()?.with_code_prompt(true);
//!
//! let acme = client.clients().get_by_org_name("Acme").await?;
//! let drafts = client.invoices().get_draft_for_client_id(acme.client_id).await?;
//! for invoice in drafts {
//!     client.invoices().send(invoice.invoice_id).await?;
//! }
//! ```
//!
//! Errors implement [`miette::Diagnostic`], so they render with a code and a hint
//! when returned from a `miette::Result` main.

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate tracing;

pub mod client;
pub mod config;
pub mod endpoints;
pub mod entities;
pub mod error;
pub mod oauth;
pub mod token;
pub mod utils;

pub use client::{Client, CodeSource};
pub use config::Config;
pub use endpoints::{FreshBooksEndpoint, Query};
pub use error::{Error, Result};
pub use oauth::KeyPair;
pub use token::{FileTokenStore, MemoryTokenStore, Token, TokenStore};

// Re-export the entity types for convenience
pub use entities::client::{Contact, FreshBooksClient, NewContact};
pub use entities::invoice::{
    ClientFilter, CreateStatus, Invoice, InvoiceBuilder, ListParameters, Status,
};
pub use entities::line_item::{Builder as LineItemBuilder, LineItem};
pub use entities::payment::PaymentOptions;
