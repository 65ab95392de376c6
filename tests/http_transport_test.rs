// Integration tests for `HttpTransport` using wiremock.
#![cfg(feature = "http")]

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use resource_kit::transport::{CookieJar, HttpTransport, SecureTransport};
use resource_kit::{
    ClientConfig, CollectionQuery, Error, Method, ModelQuery, Registry, Request,
    ResourceDefinition, SaveModel, Transport,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HttpTransport) {
    let server = MockServer::start().await;
    let transport = HttpTransport::new(&server.uri()).unwrap();
    (server, transport)
}

// ── Raw transport ───────────────────────────────────────────────────

#[tokio::test]
async fn test_get_decodes_json_and_sends_query() {
    let (server, transport) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user/"))
        .and(query_param("role", "learner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;

    let response = transport
        .call(
            Request::new(Method::Get, "/api/user/")
                .with_query(vec![("role".to_string(), "learner".to_string())]),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.data, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_error_status_is_a_response_not_a_failure() {
    let (server, transport) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/user/9/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let response = transport
        .call(Request::new(Method::Delete, "/api/user/9/"))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_empty_body_decodes_to_null() {
    let (server, transport) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/user/1/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let response = transport
        .call(Request::new(Method::Delete, "/api/user/1/"))
        .await
        .unwrap();

    assert_eq!(response.status, 204);
    assert!(response.data.is_null());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let transport = HttpTransport::new(&uri).unwrap();
    let err = transport
        .call(Request::new(Method::Get, "/api/user/"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network(_)));
}

// ── Through the registry ────────────────────────────────────────────

#[tokio::test]
async fn test_secure_registry_round_trip() {
    let (server, transport) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/user/1/"))
        .and(header("X-CSRFToken", "tok-42"))
        .and(body_json(json!({"name": "Ada L."})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Ada L."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let jar = Arc::new(CookieJar::new());
    jar.set("csrftoken", "tok-42");
    let config = ClientConfig::default().with_base_path("/api");
    let registry = Registry::new(SecureTransport::new(transport, jar, &config), config);
    let users = registry
        .define_resource(ResourceDefinition::new("user"))
        .unwrap();

    let model = users.fetch_model(ModelQuery::new("1")).await.unwrap();
    users.fetch_model(ModelQuery::new("1")).await.unwrap();
    users
        .save_model(SaveModel::update("1", json!({"name": "Ada L."})))
        .await
        .unwrap();

    assert_eq!(model.get("name"), Some(json!("Ada L.")));
}

#[tokio::test]
async fn test_paginated_collection_over_http() {
    let (server, transport) = setup().await;

    Mock::given(method("GET"))
        .and(path("/7/classes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 31,
            "results": [{"id": "c1"}, {"id": "c2"}]
        })))
        .mount(&server)
        .await;

    let registry = Registry::new(transport, ClientConfig::default());
    let classes = registry
        .define_resource(
            ResourceDefinition::new("classroom")
                .optional_identifier("facility_id")
                .path("/:facility_id?/classes"),
        )
        .unwrap();

    let collection = classes
        .fetch_collection(CollectionQuery::new().param("facility_id", 7))
        .await
        .unwrap();

    assert_eq!(collection.ids(), vec!["c1", "c2"]);
    assert_eq!(collection.total_count(), Some(31));
}
