//! Integration tests for the snaplink HTTP API.
//!
//! Every test drives the real router over an in-memory store, with the
//! click worker running in the background.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use snaplink::auth::AuthService;
use snaplink::config::{
    AuthConfig, Config, CorsConfig, DatabaseConfig, GeoIpConfig, ImageHostConfig, LogFormat,
    RateLimitConfig, ServerConfig, StoreBackend, UrlConfig,
};
use snaplink::error::AppResult;
use snaplink::models::{Click, DeviceType, NewLink};
use snaplink::server::{build_app, App};
use snaplink::services::geoip::GeoResolver;
use snaplink::services::image_host::ImageHost;
use snaplink::store::{MemoryStore, Store};
use std::sync::Arc;
use tower::ServiceExt;

const BASE_URL: &str = "http://sn.test";
const JWT_SECRET: &str = "integration_test_secret_0123456789abcdef";

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 5 * 1024 * 1024,
        },
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_seconds: 1,
        },
        url: UrlConfig {
            short_code_length: 6,
            base_url: BASE_URL.to_string(),
            default_expiry_hours: None,
            short_code_max_attempts: 10,
            strict_url_validation: true,
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            jwt_expiration_hours: 1,
        },
        rate_limit: RateLimitConfig {
            requests_per_minute: 60_000,
            burst_size: 10_000,
        },
        cors: CorsConfig::parse("*"),
        geoip: GeoIpConfig {
            maxminddb_path: None,
            api_url: None,
            timeout_ms: 100,
        },
        images: ImageHostConfig {
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            public_url: None,
        },
        log_format: LogFormat::Pretty,
    }
}

/// Image host that records nothing and always succeeds.
struct FakeImageHost;

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, owner_id: i64, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        Ok(format!(
            "https://cdn.test/qr/{}/{}-{}",
            owner_id,
            bytes.len(),
            content_type.replace('/', "-")
        ))
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    auth: AuthService,
}

struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        Self::with_image_host(None)
    }

    fn with_image_host(image_host: Option<Arc<dyn ImageHost>>) -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let App { router, worker: _ } =
            build_app(&config, store.clone(), image_host, GeoResolver::disabled())
                .expect("router builds");

        Self {
            router,
            store,
            auth: AuthService::new(JWT_SECRET.to_string(), 1),
        }
    }

    /// Provision a user and return a bearer token for it.
    async fn user(&self, username: &str) -> (i64, String) {
        let user = self.store.create_user(username, "unused-hash").await.unwrap();
        let token = self.auth.generate_token(user.id, username).unwrap();
        (user.id, token)
    }

    async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Response {
            status,
            headers,
            body,
        }
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn visit(&self, short_code: &str, user_agent: &str) -> Response {
        let request = Request::builder()
            .uri(format!("/s/{}", short_code))
            .header(header::USER_AGENT, user_agent)
            .header("x-forwarded-for", "203.0.113.50")
            .header(header::REFERER, "https://news.example/")
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn create_link(&self, token: &str, body: Value) -> Value {
        let response = self.call("POST", "/links", Some(token), Some(body)).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }

    async fn click_count(&self, link_id: i64) -> usize {
        self.store
            .find_link(link_id)
            .await
            .unwrap()
            .map(|link| link.clicks.len())
            .unwrap_or(0)
    }

    /// Clicks are recorded by the background worker; wait for them to land.
    async fn wait_for_clicks(&self, link_id: i64, expected: usize) -> usize {
        for _ in 0..200 {
            let count = self.click_count(link_id).await;
            if count >= expected {
                return count;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.click_count(link_id).await
    }
}

fn id_of(link: &Value) -> i64 {
    link["id"].as_i64().unwrap()
}

mod link_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_link_without_slug() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com"}))
            .await;

        let code = link["shortCode"].as_str().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(link["shortenedUrl"], format!("{}/s/{}", BASE_URL, code));
        assert_eq!(link["originalUrl"], "https://example.com");
        assert_eq!(link["isActive"], true);
        assert_eq!(link["clicks"], json!([]));
        assert!(link["expiresAt"].is_null());
    }

    #[tokio::test]
    async fn test_duplicate_custom_slug_rejected() {
        let app = TestApp::new();
        let (_, alice) = app.user("alice").await;
        let (_, bob) = app.user("bob").await;

        app.create_link(
            &alice,
            json!({"originalUrl": "https://example.com", "customSlug": "promo"}),
        )
        .await;

        let response = app
            .call(
                "POST",
                "/links",
                Some(&bob),
                Some(json!({"originalUrl": "https://other.example", "customSlug": "promo"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "DUPLICATE_SLUG");
        assert!(response.body["message"].as_str().unwrap().contains("promo"));
    }

    #[tokio::test]
    async fn test_missing_original_url() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call("POST", "/links", Some(&token), Some(json!({"title": "No target"})))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "VALIDATION_ERROR");
        assert_eq!(response.body["message"], "Original URL is required.");
    }

    #[tokio::test]
    async fn test_non_http_destination_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call(
                "POST",
                "/links",
                Some(&token),
                Some(json!({"originalUrl": "javascript:alert(1)"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let app = TestApp::new();

        let response = app
            .call("POST", "/links", None, Some(json!({"originalUrl": "https://example.com"})))
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let response = app.call("GET", "/links", Some("not-a-token"), None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_x_auth_token_header_accepted() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let request = Request::builder()
            .uri("/links")
            .header("x-auth-token", token)
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!([]));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_newest_first() {
        let app = TestApp::new();
        let (_, alice) = app.user("alice").await;
        let (_, bob) = app.user("bob").await;

        app.create_link(&alice, json!({"originalUrl": "https://one.example", "customSlug": "first"}))
            .await;
        app.create_link(&alice, json!({"originalUrl": "https://two.example", "customSlug": "second"}))
            .await;
        app.create_link(&bob, json!({"originalUrl": "https://bob.example"}))
            .await;

        let response = app.call("GET", "/links", Some(&alice), None).await;
        let codes: Vec<_> = response
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["shortCode"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(codes, ["second", "first"]);
    }

    #[tokio::test]
    async fn test_update_short_code_recomputes_short_url() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com", "customSlug": "before"}))
            .await;

        let response = app
            .call(
                "PUT",
                &format!("/links/{}", id_of(&link)),
                Some(&token),
                Some(json!({"shortCode": "after", "title": "Renamed"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["shortCode"], "after");
        assert_eq!(response.body["shortenedUrl"], format!("{}/s/after", BASE_URL));
        assert_eq!(response.body["title"], "Renamed");

        assert_eq!(app.visit("before", DESKTOP_UA).await.status, StatusCode::NOT_FOUND);
        assert_eq!(app.visit("after", DESKTOP_UA).await.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_update_to_taken_code_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        app.create_link(&token, json!({"originalUrl": "https://a.example", "customSlug": "taken"}))
            .await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://b.example", "customSlug": "mine"}))
            .await;

        let response = app
            .call(
                "PUT",
                &format!("/links/{}", id_of(&link)),
                Some(&token),
                Some(json!({"shortCode": "taken"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "DUPLICATE_SLUG");
    }

    #[tokio::test]
    async fn test_delete_link() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com", "customSlug": "byebye"}))
            .await;

        let response = app
            .call("DELETE", &format!("/links/{}", id_of(&link)), Some(&token), None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["message"], "Link removed");

        assert_eq!(app.visit("byebye", DESKTOP_UA).await.status, StatusCode::NOT_FOUND);
        let missing = app
            .call("DELETE", &format!("/links/{}", id_of(&link)), Some(&token), None)
            .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expiry_hours_sets_expiry() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com", "expiryHours": 2}))
            .await;

        let expires_at: chrono::DateTime<Utc> =
            serde_json::from_value(link["expiresAt"].clone()).unwrap();
        assert!(expires_at > Utc::now() + Duration::minutes(110));
        assert!(expires_at < Utc::now() + Duration::minutes(130));
    }

    #[tokio::test]
    async fn test_update_null_clears_title_and_expiry() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(
                &token,
                json!({"originalUrl": "https://example.com", "title": "Launch", "expiryHours": 2}),
            )
            .await;
        let uri = format!("/links/{}", id_of(&link));

        let untouched = app
            .call("PUT", &uri, Some(&token), Some(json!({"isActive": true})))
            .await;
        assert_eq!(untouched.status, StatusCode::OK);
        assert_eq!(untouched.body["title"], "Launch");
        assert!(!untouched.body["expiresAt"].is_null());

        let cleared = app
            .call(
                "PUT",
                &uri,
                Some(&token),
                Some(json!({"title": null, "expiresAt": null})),
            )
            .await;
        assert_eq!(cleared.status, StatusCode::OK, "{}", cleared.body);
        assert!(cleared.body["title"].is_null());
        assert!(cleared.body["expiresAt"].is_null());
        assert_eq!(cleared.body["originalUrl"], "https://example.com");
    }

    #[tokio::test]
    async fn test_mistyped_body_is_a_validation_error() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call("POST", "/links", Some(&token), Some(json!({"originalUrl": 5})))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "VALIDATION_ERROR");
        assert!(!response.body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_body_without_json_content_type_is_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let request = Request::builder()
            .method("POST")
            .uri("/links")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(r#"{"originalUrl":"https://example.com"}"#))
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "VALIDATION_ERROR");
        assert!(response.body["message"].is_string());
    }

    #[tokio::test]
    async fn test_truncated_update_body_is_a_validation_error() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com"}))
            .await;

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/links/{}", id_of(&link)))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title": "#))
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "VALIDATION_ERROR");
    }
}

mod ownership_tests {
    use super::*;

    #[tokio::test]
    async fn test_other_user_cannot_touch_link() {
        let app = TestApp::new();
        let (_, alice) = app.user("alice").await;
        let (_, bob) = app.user("bob").await;
        let link = app
            .create_link(&alice, json!({"originalUrl": "https://example.com", "customSlug": "alices"}))
            .await;
        let path = format!("/links/{}", id_of(&link));

        let update = app
            .call("PUT", &path, Some(&bob), Some(json!({"originalUrl": "https://evil.example"})))
            .await;
        assert_eq!(update.status, StatusCode::FORBIDDEN);

        let delete = app.call("DELETE", &path, Some(&bob), None).await;
        assert_eq!(delete.status, StatusCode::FORBIDDEN);

        let analytics = app.call("GET", "/links/alices/analytics", Some(&bob), None).await;
        assert_eq!(analytics.status, StatusCode::FORBIDDEN);

        // Nothing changed
        let stored = app.store.find_link(id_of(&link)).await.unwrap().unwrap();
        assert_eq!(stored.original_url, "https://example.com");
        assert_eq!(stored.short_code, "alices");
    }

    #[tokio::test]
    async fn test_unknown_link_is_not_found() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call("PUT", "/links/999", Some(&token), Some(json!({"title": "x"})))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let analytics = app.call("GET", "/links/nosuch/analytics", Some(&token), None).await;
        assert_eq!(analytics.status, StatusCode::NOT_FOUND);
    }
}

mod redirect_tests {
    use super::*;

    #[tokio::test]
    async fn test_redirect_appends_one_click_per_visit() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com/landing", "customSlug": "go-now"}))
            .await;

        for _ in 0..3 {
            let response = app.visit("go-now", DESKTOP_UA).await;
            assert_eq!(response.status, StatusCode::FOUND);
            assert_eq!(
                response.headers[header::LOCATION],
                "https://example.com/landing"
            );
        }

        assert_eq!(app.wait_for_clicks(id_of(&link), 3).await, 3);

        let events = app.call("GET", "/analytics?slug=go-now", Some(&token), None).await;
        let events = events.body.as_array().unwrap().clone();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["ip"], "203.0.113.50");
        assert_eq!(events[0]["referrer"], "https://news.example/");
        assert_eq!(events[0]["deviceType"], "desktop");
    }

    #[tokio::test]
    async fn test_expired_link_is_gone_and_not_counted() {
        let app = TestApp::new();
        let (owner_id, _) = app.user("alice").await;
        let link = app
            .store
            .insert_link(NewLink {
                owner_id,
                original_url: "https://example.com".to_string(),
                short_code: "old-one".to_string(),
                title: None,
                created_at: Utc::now() - Duration::days(2),
                expires_at: Some(Utc::now() - Duration::days(1)),
            })
            .await
            .unwrap();

        let response = app.visit("old-one", DESKTOP_UA).await;
        assert_eq!(response.status, StatusCode::GONE);
        assert_eq!(response.body["error"], "LINK_EXPIRED");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(app.click_count(link.id).await, 0);
    }

    #[tokio::test]
    async fn test_inactive_link_is_gone() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com", "customSlug": "paused"}))
            .await;

        let response = app
            .call(
                "PUT",
                &format!("/links/{}", id_of(&link)),
                Some(&token),
                Some(json!({"isActive": false})),
            )
            .await;
        assert_eq!(response.body["isActive"], false);

        let response = app.visit("paused", DESKTOP_UA).await;
        assert_eq!(response.status, StatusCode::GONE);
        assert_eq!(response.body["error"], "LINK_INACTIVE");
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let app = TestApp::new();
        let response = app.visit("nope42", DESKTOP_UA).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/_health")
            .header("x-request-id", "trace-me-123")
            .body(Body::empty())
            .unwrap();

        let response = app.send(request).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["x-request-id"], "trace-me-123");
        assert_eq!(response.body["status"], "healthy");
    }
}

mod analytics_tests {
    use super::*;

    #[tokio::test]
    async fn test_over_time_example() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com"}))
            .await;

        for (day, hour) in [(1, 8), (1, 17), (2, 9)] {
            app.store
                .append_click(
                    id_of(&link),
                    Click {
                        timestamp: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
                        device_type: DeviceType::Desktop,
                        region: "US".to_string(),
                        user_agent: None,
                    },
                )
                .await
                .unwrap();
        }

        let response = app
            .call("GET", "/links/over-time-analytics", Some(&token), None)
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            json!({
                "overTime": [
                    {"date": "2024-01-01", "value": 2},
                    {"date": "2024-01-02", "value": 1}
                ],
                "top": {"date": "2024-01-01", "value": 2}
            })
        );
    }

    #[tokio::test]
    async fn test_device_totals_match_clicks() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let first = app
            .create_link(&token, json!({"originalUrl": "https://a.example", "customSlug": "dev-a"}))
            .await;
        let second = app
            .create_link(&token, json!({"originalUrl": "https://b.example", "customSlug": "dev-b"}))
            .await;

        app.visit("dev-a", IPHONE_UA).await;
        app.visit("dev-a", DESKTOP_UA).await;
        app.visit("dev-b", IPAD_UA).await;
        app.visit("dev-b", "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)")
            .await;
        app.wait_for_clicks(id_of(&first), 2).await;
        app.wait_for_clicks(id_of(&second), 2).await;

        let response = app
            .call("GET", "/links/device-analytics", Some(&token), None)
            .await;
        assert_eq!(
            response.body,
            json!([
                {"name": "Desktop", "value": 1},
                {"name": "Mobile", "value": 1},
                {"name": "Tablet", "value": 1},
                {"name": "Unknown", "value": 1}
            ])
        );

        let total: u64 = response
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["value"].as_u64().unwrap())
            .sum();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_device_analytics_empty_has_all_buckets() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call("GET", "/links/device-analytics", Some(&token), None)
            .await;
        let buckets = response.body.as_array().unwrap();
        assert_eq!(buckets.len(), 4);
        assert!(buckets.iter().all(|b| b["value"] == 0));
    }

    #[tokio::test]
    async fn test_summary_and_per_link_analytics() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com", "customSlug": "sum-up"}))
            .await;

        app.visit("sum-up", IPHONE_UA).await;
        app.visit("sum-up", IPHONE_UA).await;
        app.wait_for_clicks(id_of(&link), 2).await;

        let summary = app
            .call("GET", "/links/summary-analytics", Some(&token), None)
            .await;
        assert_eq!(summary.body["shortLinksCount"], 1);
        assert_eq!(summary.body["qrCodesCount"], 1);
        assert_eq!(summary.body["deviceData"][1], json!({"name": "Mobile", "value": 2}));

        let per_link = app
            .call("GET", "/links/sum-up/analytics", Some(&token), None)
            .await;
        assert_eq!(
            per_link.body,
            json!({
                "totalClicks": 2,
                "mobileClicks": 2,
                "desktopClicks": 0,
                "regionalData": {"unknown": 2}
            })
        );
    }
}

mod qr_tests {
    use super::*;

    fn multipart_body(boundary: &str, token: Option<&str>, content_type: &str) -> Body {
        let mut body = String::new();
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nhttp://sn.test/s/abc\r\n",
            b = boundary
        ));
        if let Some(token) = token {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"token\"\r\n\r\n{t}\r\n",
                b = boundary,
                t = token
            ));
        }
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"qrImage\"; filename=\"qr.png\"\r\nContent-Type: {ct}\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary,
            ct = content_type
        ));
        Body::from(body)
    }

    fn upload_request(token: Option<&str>, content_type: &str) -> Request<Body> {
        let boundary = "snaplink-boundary";
        Request::builder()
            .method("POST")
            .uri("/upload-qr")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(multipart_body(boundary, token, content_type))
            .unwrap()
    }

    #[tokio::test]
    async fn test_link_creation_adds_one_qr() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;
        let link = app
            .create_link(&token, json!({"originalUrl": "https://example.com"}))
            .await;

        let response = app.call("GET", "/links/qr", Some(&token), None).await;
        let codes = response.body.as_array().unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0]["text"], link["shortenedUrl"]);
        assert!(codes[0]["imageUrl"].is_null());
    }

    #[tokio::test]
    async fn test_qr_codes_are_owner_scoped() {
        let app = TestApp::new();
        let (_, alice) = app.user("alice").await;
        let (_, bob) = app.user("bob").await;

        let created = app
            .call("POST", "/links/qr", Some(&alice), Some(json!({"text": "hello world"})))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        let qr_id = created.body["id"].as_i64().unwrap();

        let bobs = app.call("GET", "/qrcodes", Some(&bob), None).await;
        assert_eq!(bobs.body, json!([]));

        let stolen = app
            .call("DELETE", &format!("/qrcodes/{}", qr_id), Some(&bob), None)
            .await;
        assert_eq!(stolen.status, StatusCode::FORBIDDEN);

        let removed = app
            .call("DELETE", &format!("/qrcodes/{}", qr_id), Some(&alice), None)
            .await;
        assert_eq!(removed.status, StatusCode::OK);
        assert_eq!(removed.body["message"], "QR code removed");

        let alices = app.call("GET", "/qrcodes", Some(&alice), None).await;
        assert_eq!(alices.body, json!([]));
    }

    #[tokio::test]
    async fn test_create_qr_requires_text() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app
            .call("POST", "/links/qr", Some(&token), Some(json!({})))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_with_form_token() {
        let app = TestApp::with_image_host(Some(Arc::new(FakeImageHost)));
        let (owner_id, token) = app.user("alice").await;

        let response = app.send(upload_request(Some(&token), "image/png")).await;

        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        assert_eq!(response.body["text"], "http://sn.test/s/abc");
        assert_eq!(
            response.body["imageUrl"],
            format!("https://cdn.test/qr/{}/7-image-png", owner_id)
        );
    }

    #[tokio::test]
    async fn test_upload_without_token_is_unauthorized() {
        let app = TestApp::with_image_host(Some(Arc::new(FakeImageHost)));

        let response = app.send(upload_request(None, "image/png")).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_without_image_host_fails_upstream() {
        let app = TestApp::new();
        let (_, token) = app.user("alice").await;

        let response = app.send(upload_request(Some(&token), "image/png")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body["error"], "UPSTREAM_FAILURE");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let app = TestApp::with_image_host(Some(Arc::new(FakeImageHost)));
        let (_, token) = app.user("alice").await;

        let response = app.send(upload_request(Some(&token), "text/plain")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
}

mod auth_tests {
    use super::*;

    async fn app_with_password(password: &str) -> TestApp {
        let app = TestApp::new();
        let hash = bcrypt::hash(password, 4).unwrap();
        app.store.create_user("carol", &hash).await.unwrap();
        app
    }

    #[tokio::test]
    async fn test_login_issues_usable_token() {
        let app = app_with_password("s3cret-pass").await;

        let response = app
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "carol", "password": "s3cret-pass"})),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["username"], "carol");

        let token = response.body["token"].as_str().unwrap();
        let links = app.call("GET", "/links", Some(token), None).await;
        assert_eq!(links.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let app = app_with_password("s3cret-pass").await;

        let response = app
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "carol", "password": "guess"})),
            )
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let unknown = app
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "nobody", "password": "guess"})),
            )
            .await;
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_with_malformed_body() {
        let app = app_with_password("s3cret-pass").await;

        let response = app
            .call("POST", "/auth/login", None, Some(json!({"username": "carol"})))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "VALIDATION_ERROR");
    }
}
