//! FreshBooks clients (the customers invoices are addressed to) and their contacts.

use serde::{de::IgnoredAny, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    endpoints::{FreshBooksEndpoint, Query},
    entities::{reshape, reshape_one, Pagination},
    error::{Error, Result},
    utils::serde_helpers::null_as_default,
    Client,
};

const ENTITY: &str = "Client";
const PAGE_SIZE: u32 = 100;

/// An additional contact attached to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "contactid")]
    pub contact_id: i64,
    #[serde(rename = "fname", default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(rename = "lname", default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

impl Contact {
    #[must_use]
    pub fn to_new_contact(&self) -> NewContact {
        NewContact {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// A contact as it is sent when writing a client's contact list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub email: String,
    #[serde(rename = "fname")]
    pub first_name: String,
    #[serde(rename = "lname")]
    pub last_name: String,
}

impl NewContact {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FreshBooksClient {
    #[serde(rename = "userid")]
    pub client_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organization: String,
    #[serde(rename = "fname", default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(rename = "lname", default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contacts: Vec<Contact>,
}

impl FreshBooksClient {
    #[must_use]
    pub fn contact(&self, email: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.email == email)
    }

    #[must_use]
    pub fn contact_id_for_email(&self, email: &str) -> Option<i64> {
        self.contact(email).map(|c| c.contact_id)
    }

    #[must_use]
    pub fn email_for_contact_id(&self, contact_id: i64) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.contact_id == contact_id)
            .map(|c| c.email.as_str())
    }
}

#[derive(Deserialize)]
struct ListResponse {
    clients: Vec<Value>,
    #[serde(flatten)]
    pagination: Pagination,
}

#[derive(Deserialize)]
struct SingleResponse {
    client: Value,
}

#[derive(Deserialize)]
struct CreatedClient {
    id: i64,
}

#[derive(Deserialize)]
struct CreateResponse {
    client: CreatedClient,
}

/// Retrieve a single client by its id, contacts included.
#[instrument(skip(client))]
pub async fn get(client: &Client, client_id: i64) -> Result<FreshBooksClient> {
    let query = Query::new().include("contacts");
    let response: SingleResponse = client
        .get(FreshBooksEndpoint::Client(client_id), &query)
        .await?;
    reshape_one(ENTITY, response.client)
}

/// Find the client with this email address.
#[instrument(skip(client))]
pub async fn get_by_email(client: &Client, email: &str) -> Result<FreshBooksClient> {
    let query = Query::new().search("email", email).include("contacts");
    search_one(client, query, email).await
}

/// Find a client whose organization name matches `org_name`.
#[instrument(skip(client))]
pub async fn get_by_org_name(client: &Client, org_name: &str) -> Result<FreshBooksClient> {
    let query = Query::new()
        .search("organization_like", org_name)
        .include("contacts");
    search_one(client, query, org_name).await
}

async fn search_one(client: &Client, query: Query, term: &str) -> Result<FreshBooksClient> {
    let response: ListResponse = client.get(FreshBooksEndpoint::Clients, &query).await?;
    let mut clients: Vec<FreshBooksClient> = reshape(ENTITY, response.clients)?;
    if clients.len() > 1 {
        warn!(
            matches = clients.len(),
            term, "more than one client matched, returning the first"
        );
    }
    if clients.is_empty() {
        let config = client.config();
        let url = FreshBooksEndpoint::Clients.to_url(&config.base_url, &config.account_id)?;
        return Err(Error::NotFound {
            entity: ENTITY.to_string(),
            url: url.to_string(),
            status_code: reqwest::StatusCode::NOT_FOUND,
            response_body: Some(format!("no client matched {term:?}")),
        });
    }
    Ok(clients.swap_remove(0))
}

/// Retrieve every client, walking all result pages.
#[instrument(skip(client))]
pub async fn list(client: &Client) -> Result<Vec<FreshBooksClient>> {
    let mut clients = Vec::new();
    let mut page = 1;
    loop {
        let query = Query::new()
            .include("contacts")
            .param("page", page)
            .param("per_page", PAGE_SIZE);
        let response: ListResponse = client.get(FreshBooksEndpoint::Clients, &query).await?;
        let done = response.clients.is_empty() || response.pagination.is_last_page();
        clients.extend(reshape::<FreshBooksClient>(ENTITY, response.clients)?);
        if done {
            break;
        }
        page += 1;
    }
    debug!("found {} clients", clients.len());
    Ok(clients)
}

/// Create a client, then fetch it back so the result carries server-side fields.
#[instrument(skip(client))]
pub async fn create(
    client: &Client,
    first_name: &str,
    last_name: &str,
    email: &str,
    organization: &str,
) -> Result<FreshBooksClient> {
    let data = json!({
        "client": {
            "fname": first_name,
            "lname": last_name,
            "email": email,
            "organization": organization,
        }
    });
    let created: CreateResponse = client.post(FreshBooksEndpoint::Clients, &data).await?;
    get(client, created.client.id).await
}

/// Hide a client (FreshBooks never hard-deletes).
#[instrument(skip(client))]
pub async fn delete(client: &Client, client_id: i64) -> Result<()> {
    update_client(client, client_id, json!({ "vis_state": 1 })).await
}

/// Replace the client's contact list.
#[instrument(skip(client))]
pub async fn update_contacts(client: &Client, client_id: i64, contacts: &[NewContact]) -> Result<()> {
    update_client(client, client_id, json!({ "contacts": contacts })).await
}

/// Add contacts to a client. A contact whose email is already present replaces the
/// existing one in place; the rest are appended.
#[instrument(skip(client))]
pub async fn add_contacts(client: &Client, client_id: i64, contacts: &[NewContact]) -> Result<()> {
    let current = get(client, client_id).await?;
    let merged = merge_contacts(&current.contacts, contacts);
    update_contacts(client, client_id, &merged).await
}

/// Remove the contact with this email. Does nothing if there is none.
#[instrument(skip(client))]
pub async fn delete_contact(client: &Client, client_id: i64, email: &str) -> Result<()> {
    let current = get(client, client_id).await?;
    let Some(target) = current.contact(email) else {
        debug!("client has no contact with that email, nothing to delete");
        return Ok(());
    };
    let remaining: Vec<NewContact> = current
        .contacts
        .iter()
        .filter(|c| *c != target)
        .map(Contact::to_new_contact)
        .collect();
    update_contacts(client, client_id, &remaining).await
}

async fn update_client(client: &Client, client_id: i64, data: Value) -> Result<()> {
    let _: IgnoredAny = client
        .put(FreshBooksEndpoint::Client(client_id), &json!({ "client": data }))
        .await?;
    Ok(())
}

pub(crate) fn merge_contacts(current: &[Contact], new: &[NewContact]) -> Vec<NewContact> {
    let mut pending: Vec<&NewContact> = Vec::with_capacity(new.len());
    for contact in new {
        // a repeated email in `new` keeps the last entry
        match pending.iter().position(|c| c.email == contact.email) {
            Some(i) => pending[i] = contact,
            None => pending.push(contact),
        }
    }

    let mut merged = Vec::with_capacity(current.len() + pending.len());
    for existing in current {
        match pending.iter().position(|c| c.email == existing.email) {
            Some(i) => merged.push(pending.remove(i).clone()),
            None => merged.push(existing.to_new_contact()),
        }
    }
    merged.extend(pending.into_iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i64, email: &str, first_name: &str) -> Contact {
        Contact {
            contact_id: id,
            first_name: first_name.to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn merge_replaces_by_email_and_appends_new() {
        let current = vec![contact(1, "a@example.com", "Ann"), contact(2, "b@example.com", "Bob")];
        let new = vec![
            NewContact::new("c@example.com", "Cat", "Doe"),
            NewContact::new("b@example.com", "Robert", "Doe"),
        ];

        let merged = merge_contacts(&current, &new);
        let names: Vec<&str> = merged.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, ["Ann", "Robert", "Cat"]);
    }

    #[test]
    fn merge_with_no_current_contacts_keeps_new_ones() {
        let new = vec![NewContact::new("a@example.com", "Ann", "Doe")];
        assert_eq!(merge_contacts(&[], &new), new);
    }

    #[test]
    fn lookups_by_email_and_id() {
        let client: FreshBooksClient = serde_json::from_value(json!({
            "userid": 5,
            "email": "owner@example.com",
            "organization": "Acme",
            "fname": "Olive",
            "lname": null,
            "contacts": [{"contactid": 9, "fname": "Ann", "lname": "Doe", "email": "a@example.com"}]
        }))
        .unwrap();

        assert_eq!(client.last_name, "");
        assert_eq!(client.contact_id_for_email("a@example.com"), Some(9));
        assert_eq!(client.email_for_contact_id(9), Some("a@example.com"));
        assert!(client.contact("missing@example.com").is_none());
    }
}
