use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use freshbooks_rs::{error::Error, NewContact};

mod test_utils;
use test_utils::*;

fn list_body(clients: Vec<serde_json::Value>, page: u32, pages: u32) -> serde_json::Value {
    let total = clients.len();
    envelope(json!({
        "clients": clients,
        "page": page,
        "pages": pages,
        "per_page": 100,
        "total": total
    }))
}

async fn mount_get(server: &MockServer, record: serde_json::Value) {
    let id = record["userid"].as_i64().unwrap();
    Mock::given(method("GET"))
        .and(path(format!("{CLIENTS_PATH}/{id}")))
        .and(query_param("include[]", "contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "client": record }))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn get_client_reshapes_contacts() {
    do_setup();
    let server = MockServer::start().await;
    mount_get(&server, client_record(7, "olive@acme.test", "Acme")).await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let acme = client.clients().get(7).await.unwrap();

    assert_eq!(acme.client_id, 7);
    assert_eq!(acme.organization, "Acme");
    assert_eq!(acme.first_name, "Olive");
    assert_eq!(acme.contacts.len(), 2);
    assert_eq!(acme.contact_id_for_email("bob@example.com"), Some(12));
    assert_eq!(acme.email_for_contact_id(11), Some("ann@example.com"));
}

#[tokio::test]
async fn get_by_email_returns_first_of_several_matches() {
    do_setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CLIENTS_PATH))
        .and(query_param("search[email]", "shared@acme.test"))
        .and(query_param("include[]", "contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            vec![
                client_record(1, "shared@acme.test", "Acme"),
                client_record(2, "shared@acme.test", "Acme East"),
            ],
            1,
            1,
        )))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let found = client.clients().get_by_email("shared@acme.test").await.unwrap();
    assert_eq!(found.client_id, 1);
}

#[tokio::test]
async fn get_by_org_name_without_matches_is_not_found() {
    do_setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CLIENTS_PATH))
        .and(query_param("search[organization_like]", "Nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], 1, 0)))
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let result = client.clients().get_by_org_name("Nobody").await;
    match result {
        Err(Error::NotFound { entity, url, .. }) => {
            assert_eq!(entity, "Client");
            assert_eq!(url, format!("{}{CLIENTS_PATH}", server.uri()));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn list_walks_every_page() {
    do_setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CLIENTS_PATH))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            vec![client_record(1, "a@a.test", "A"), client_record(2, "b@b.test", "B")],
            1,
            2,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CLIENTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
            vec![client_record(3, "c@c.test", "C")],
            2,
            2,
        )))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let all = client.clients().list().await.unwrap();
    let ids: Vec<i64> = all.iter().map(|c| c.client_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn create_posts_then_fetches_the_new_client() {
    do_setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CLIENTS_PATH))
        .and(body_json(json!({
            "client": {
                "fname": "Olive",
                "lname": "Owner",
                "email": "olive@acme.test",
                "organization": "Acme"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "client": { "id": 42, "userid": 42 }
        }))))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, client_record(42, "olive@acme.test", "Acme")).await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let created = client
        .clients()
        .create("Olive", "Owner", "olive@acme.test", "Acme")
        .await
        .unwrap();
    assert_eq!(created.client_id, 42);
    assert_eq!(created.contacts.len(), 2);
}

#[tokio::test]
async fn delete_hides_the_client() {
    do_setup();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{CLIENTS_PATH}/9")))
        .and(body_json(json!({ "client": { "vis_state": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "client": client_record(9, "gone@acme.test", "Gone")
        }))))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    client.clients().delete(9).await.unwrap();
}

#[tokio::test]
async fn add_contacts_replaces_by_email_and_appends() {
    do_setup();
    let server = MockServer::start().await;
    mount_get(&server, client_record(7, "olive@acme.test", "Acme")).await;
    Mock::given(method("PUT"))
        .and(path(format!("{CLIENTS_PATH}/7")))
        .and(body_json(json!({
            "client": {
                "contacts": [
                    {"email": "ann@example.com", "fname": "Annie", "lname": "Doe"},
                    {"email": "bob@example.com", "fname": "Bob", "lname": "Doe"},
                    {"email": "cat@example.com", "fname": "Cat", "lname": "Roe"}
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    client
        .clients()
        .add_contacts(
            7,
            &[
                NewContact::new("cat@example.com", "Cat", "Roe"),
                NewContact::new("ann@example.com", "Annie", "Doe"),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_contact_sends_remaining_contacts() {
    do_setup();
    let server = MockServer::start().await;
    mount_get(&server, client_record(7, "olive@acme.test", "Acme")).await;
    Mock::given(method("PUT"))
        .and(path(format!("{CLIENTS_PATH}/7")))
        .and(body_json(json!({
            "client": {
                "contacts": [
                    {"email": "bob@example.com", "fname": "Bob", "lname": "Doe"}
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    client
        .clients()
        .delete_contact(7, "ann@example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_unknown_contact_makes_no_update() {
    do_setup();
    let server = MockServer::start().await;
    mount_get(&server, client_record(7, "olive@acme.test", "Acme")).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    client
        .clients()
        .delete_contact(7, "nobody@example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn malformed_client_record_reports_invalid_field() {
    do_setup();
    let server = MockServer::start().await;
    mount_get(&server, json!({ "userid": 3, "contacts": "not a list" })).await;
    let (client, _store) = test_client(&server, Some(fresh_token()));

    let result = client.clients().get(3).await;
    match result {
        Err(Error::InvalidField { entity, record, .. }) => {
            assert_eq!(entity, "Client");
            assert!(record.contains("not a list"));
        }
        other => panic!("expected InvalidField, got {other:?}"),
    }
}
