//! Integration tests for accounts, teams and API keys.

mod common;

use axum::http::StatusCode;
use common::{Auth, TestServer, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let server = TestServer::new().await;
    let (status, body) = server.request("GET", "/health", None, Auth::Anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let server = TestServer::new().await;
    let id = server.register("Alice@Example.com").await;

    let (status, body) = server
        .request(
            "POST",
            "/api/users/login",
            Some(json!({ "email": "alice@example.com", "password": PASSWORD })),
            Auth::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["username"], "alice@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert!(!body["user"]["last_login"].is_null());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, body) = server
        .request(
            "PUT",
            "/api/users/me",
            Some(json!({ "first_name": "Alice", "phone": "555-0100" })),
            Auth::Bearer(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Alice");
    assert_eq!(body["phone"], "555-0100");

    let (_, body) = server
        .request(
            "PUT",
            "/api/users/me",
            Some(json!({ "phone": null })),
            Auth::Bearer(&token),
        )
        .await;
    assert!(body["phone"].is_null());
    assert_eq!(body["first_name"], "Alice");
}

#[tokio::test]
async fn test_login_records_client_address() {
    let server = TestServer::new().await;
    let id = server.register("ip@example.com").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
        .body(axum::body::Body::from(
            json!({ "email": "ip@example.com", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = tower::ServiceExt::oneshot(server.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = database::user::get_user(server.state.db.pool(), &id).await.unwrap();
    assert_eq!(user.last_login_ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_registration_validation() {
    let server = TestServer::new().await;
    server.register("taken@example.com").await;

    let cases = [
        (
            json!({ "email": "taken@example.com", "password": PASSWORD, "confirm_password": PASSWORD }),
            "email",
        ),
        (
            json!({ "email": "TAKEN@example.com", "password": PASSWORD, "confirm_password": PASSWORD }),
            "email",
        ),
        (
            json!({ "email": "not-an-email", "password": PASSWORD, "confirm_password": PASSWORD }),
            "email",
        ),
        (
            json!({ "email": "new@example.com", "password": PASSWORD, "confirm_password": "different" }),
            "confirm_password",
        ),
        (
            json!({ "email": "new@example.com", "password": "12345678", "confirm_password": "12345678" }),
            "password",
        ),
        (
            json!({ "email": "new@example.com", "password": "short", "confirm_password": "short" }),
            "password",
        ),
        (json!({ "email": "new@example.com" }), "password"),
    ];

    for (body, field) in cases {
        let (status, response) = server
            .request("POST", "/api/users", Some(body.clone()), Auth::Anonymous)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {body}");
        assert_eq!(response["code"], "validation_error");
        assert_eq!(response["field"], field, "for {body}");
    }
}

#[tokio::test]
async fn test_login_rejections() {
    let server = TestServer::new().await;
    let id = server.register("bob@example.com").await;

    let (status, body) = server
        .request(
            "POST",
            "/api/users/login",
            Some(json!({ "email": "bob@example.com", "password": "wrong-password" })),
            Auth::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = server
        .request(
            "POST",
            "/api/users/login",
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
            Auth::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    database::user::set_active(server.state.db.pool(), &id, false)
        .await
        .unwrap();
    let (status, body) = server
        .request(
            "POST",
            "/api/users/login",
            Some(json!({ "email": "bob@example.com", "password": PASSWORD })),
            Auth::Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Account is disabled");
}

#[tokio::test]
async fn test_authentication_required() {
    let server = TestServer::new().await;

    for uri in ["/api/users/me", "/api/knowledge-bases", "/api/teams", "/api/api-keys"] {
        let (status, body) = server.request("GET", uri, None, Auth::Anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], "unauthorized");
    }

    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer("bogus"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let server = TestServer::new().await;
    let (_, token) = server.signup("carol@example.com").await;
    let other = server.login("carol@example.com", PASSWORD).await;

    let (status, _) = server
        .request("POST", "/api/users/logout", None, Auth::Bearer(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Only the presented session is revoked.
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&other))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_revokes_other_sessions() {
    let server = TestServer::new().await;
    let (_, current) = server.signup("dave@example.com").await;
    let stale = server.login("dave@example.com", PASSWORD).await;

    let (status, body) = server
        .request(
            "POST",
            "/api/users/change_password",
            Some(json!({
                "old_password": "not-it",
                "new_password": "N3w-Secret-Phrase",
                "confirm_password": "N3w-Secret-Phrase",
            })),
            Auth::Bearer(&current),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "old_password");

    let (status, body) = server
        .request(
            "POST",
            "/api/users/change_password",
            Some(json!({
                "old_password": PASSWORD,
                "new_password": "N3w-Secret-Phrase",
                "confirm_password": "N3w-Secret-Phras",
            })),
            Auth::Bearer(&current),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "confirm_password");

    let (status, _) = server
        .request(
            "POST",
            "/api/users/change_password",
            Some(json!({
                "old_password": PASSWORD,
                "new_password": "N3w-Secret-Phrase",
                "confirm_password": "N3w-Secret-Phrase",
            })),
            Auth::Bearer(&current),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&current))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&stale))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.login("dave@example.com", "N3w-Secret-Phrase").await;
}

#[tokio::test]
async fn test_user_administration_requires_staff() {
    let server = TestServer::new().await;
    let (admin_id, admin) = server.signup("admin@example.com").await;
    let (user_id, user) = server.signup("user@example.com").await;

    let (status, body) = server
        .request("GET", "/api/users", None, Auth::Bearer(&user))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
    let (status, _) = server
        .request("DELETE", &format!("/api/users/{admin_id}"), None, Auth::Bearer(&user))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    database::user::set_staff(server.state.db.pool(), &admin_id, true)
        .await
        .unwrap();

    let (status, body) = server
        .request("GET", "/api/users", None, Auth::Bearer(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = server
        .request(
            "PUT",
            &format!("/api/users/{user_id}"),
            Some(json!({ "is_active": false })),
            Auth::Bearer(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::Bearer(&user))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .request("DELETE", &format!("/api/users/{user_id}"), None, Auth::Bearer(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .request("GET", &format!("/api/users/{user_id}"), None, Auth::Bearer(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_is_created_lazily() {
    let server = TestServer::new().await;
    let (id, token) = server.signup("erin@example.com").await;

    let (status, body) = server
        .request("GET", "/api/profile", None, Auth::Bearer(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], id.as_str());
    assert_eq!(body["language"], "zh-hans");
    assert_eq!(body["timezone"], "Asia/Shanghai");

    let (status, body) = server
        .request(
            "PUT",
            "/api/profile",
            Some(json!({ "company": "Acme", "language": "en" })),
            Auth::Bearer(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company"], "Acme");
    assert_eq!(body["language"], "en");
    assert_eq!(body["timezone"], "Asia/Shanghai");
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let server = TestServer::new().await;
    let (_, token) = server.signup("frank@example.com").await;

    let (status, body) = server
        .request(
            "POST",
            "/api/api-keys",
            Some(json!({ "name": "ci" })),
            Auth::Bearer(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let key_id = body["id"].as_str().unwrap().to_string();
    let secret = body["key"].as_str().unwrap().to_string();
    assert!(secret.starts_with(body["key_prefix"].as_str().unwrap()));

    // The secret is never listed again.
    let (_, body) = server
        .request("GET", "/api/api-keys", None, Auth::Bearer(&token))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(body[0].get("key").is_none());

    let (status, body) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&secret))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "frank@example.com");

    let (_, body) = server
        .request("GET", &format!("/api/api-keys/{key_id}"), None, Auth::Bearer(&token))
        .await;
    assert!(!body["last_used_at"].is_null());

    // Deactivated keys stop authenticating.
    let (status, _) = server
        .request(
            "PUT",
            &format!("/api/api-keys/{key_id}"),
            Some(json!({ "is_active": false })),
            Auth::Bearer(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&secret))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server
        .request(
            "PUT",
            &format!("/api/api-keys/{key_id}"),
            Some(json!({ "is_active": true })),
            Auth::Bearer(&token),
        )
        .await;

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/api-keys/{key_id}/regenerate"),
            None,
            Auth::Bearer(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], key_id.as_str());
    assert_eq!(body["name"], "ci");
    let fresh = body["key"].as_str().unwrap().to_string();
    assert_ne!(fresh, secret);

    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&secret))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&fresh))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .request("DELETE", &format!("/api/api-keys/{key_id}"), None, Auth::Bearer(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&fresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_keys_are_private_and_expire() {
    let server = TestServer::new().await;
    let (_, owner) = server.signup("gina@example.com").await;
    let (_, other) = server.signup("hank@example.com").await;

    let (status, body) = server
        .request(
            "POST",
            "/api/api-keys",
            Some(json!({ "name": "old", "expires_at": "2000-01-01T00:00:00Z" })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["expires_at"], "2000-01-01 00:00:00");
    let key_id = body["id"].as_str().unwrap().to_string();
    let secret = body["key"].as_str().unwrap().to_string();

    let (status, _) = server
        .request("GET", "/api/users/me", None, Auth::ApiKey(&secret))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .request("GET", &format!("/api/api-keys/{key_id}"), None, Auth::Bearer(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .request(
            "POST",
            "/api/api-keys",
            Some(json!({ "name": "bad", "expires_at": "next tuesday" })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "expires_at");
}

#[tokio::test]
async fn test_team_membership_rules() {
    let server = TestServer::new().await;
    let (owner_id, owner) = server.signup("owner@example.com").await;
    let (member_id, member) = server.signup("member@example.com").await;
    let (stranger_id, stranger) = server.signup("stranger@example.com").await;

    let (status, body) = server
        .request(
            "POST",
            "/api/teams",
            Some(json!({ "name": "Research", "description": "R&D" })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["members_count"], 1);
    assert_eq!(body["owner_id"], owner_id.as_str());
    let team = body["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .request("GET", &format!("/api/teams/{team}"), None, Auth::Bearer(&stranger))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let add = |user_id: &str, role: Option<&str>| {
        let mut body = json!({ "user_id": user_id });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        body
    };

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(add(&member_id, None)),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "member");
    assert_eq!(body["user_email"], "member@example.com");

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(add(&member_id, Some("admin"))),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(add(&stranger_id, Some("owner"))),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "role");

    let (status, _) = server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(add("missing-user", None)),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Plain members can look but not manage.
    let (status, body) = server
        .request("GET", &format!("/api/teams/{team}/members"), None, Auth::Bearer(&member))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    let (status, _) = server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(add(&stranger_id, None)),
            Auth::Bearer(&member),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .request(
            "DELETE",
            &format!("/api/teams/{team}/remove_member"),
            Some(json!({ "user_id": owner_id })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .request(
            "DELETE",
            &format!("/api/teams/{team}/remove_member"),
            Some(json!({ "user_id": stranger_id })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .request(
            "DELETE",
            &format!("/api/teams/{team}/remove_member"),
            Some(json!({ "user_id": member_id })),
            Auth::Bearer(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server
        .request("GET", "/api/teams", None, Auth::Bearer(&member))
        .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_team_update_and_delete() {
    let server = TestServer::new().await;
    let (_, owner) = server.signup("owner@example.com").await;
    let (admin_id, admin) = server.signup("lead@example.com").await;

    let (_, body) = server
        .request(
            "POST",
            "/api/teams",
            Some(json!({ "name": "Ops" })),
            Auth::Bearer(&owner),
        )
        .await;
    let team = body["id"].as_str().unwrap().to_string();
    server
        .request(
            "POST",
            &format!("/api/teams/{team}/add_member"),
            Some(json!({ "user_id": admin_id, "role": "admin" })),
            Auth::Bearer(&owner),
        )
        .await;

    let (status, body) = server
        .request(
            "PUT",
            &format!("/api/teams/{team}"),
            Some(json!({ "name": "Operations", "description": "on call" })),
            Auth::Bearer(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Operations");
    assert_eq!(body["members_count"], 2);

    // Only the owner may delete.
    let (status, _) = server
        .request("DELETE", &format!("/api/teams/{team}"), None, Auth::Bearer(&admin))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .request("DELETE", &format!("/api/teams/{team}"), None, Auth::Bearer(&owner))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .request("GET", &format!("/api/teams/{team}"), None, Auth::Bearer(&owner))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
