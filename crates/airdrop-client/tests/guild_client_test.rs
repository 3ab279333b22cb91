//! Contract tests for GuildClient against a mocked Guild API.
//!
//! | Method | Path                     | Test            |
//! |--------|--------------------------|-----------------|
//! | GET    | `/v1/guild/{community}`  | `role_members_*`|

use airdrop_client::{ClientConfig, GuildClient, MembershipError, MembershipSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> GuildClient {
    let mut config = ClientConfig::local_mock(19100).unwrap();
    config.membership_url = mock_server.uri().parse().unwrap();
    GuildClient::new(&config).unwrap()
}

#[tokio::test]
async fn role_members_returns_members_in_api_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/guild/increment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 1985,
            "name": "Increment",
            "roles": [
                { "id": 1, "name": "Member", "members": [] },
                { "id": 9494, "name": "Early", "members": [
                    "0x3333333333333333333333333333333333333333",
                    "0x1111111111111111111111111111111111111111",
                    "0x2222222222222222222222222222222222222222"
                ]}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let members = client.role_members("increment", 9494).await.unwrap();

    let rendered: Vec<&str> = members.iter().map(|a| a.as_str()).collect();
    assert_eq!(
        rendered,
        vec![
            "0x3333333333333333333333333333333333333333",
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
        ]
    );
}

#[tokio::test]
async fn role_members_missing_role_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/guild/increment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "roles": [{ "id": 1, "members": [] }]
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.role_members("increment", 9494).await.unwrap_err();
    assert!(matches!(err, MembershipError::RoleNotFound { role_id: 9494, .. }));
}

#[tokio::test]
async fn role_members_api_error_carries_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/guild/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_string("guild not found"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.role_members("unknown", 1).await.unwrap_err();
    match err {
        MembershipError::ApiError { status, body, .. } => {
            assert_eq!(status, 404);
            assert!(body.contains("guild not found"));
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn role_members_malformed_body_is_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/guild/increment"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.role_members("increment", 9494).await.unwrap_err();
    assert!(matches!(err, MembershipError::Deserialization { .. }));
}
