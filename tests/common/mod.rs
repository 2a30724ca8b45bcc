// tests/common/mod.rs

#![allow(dead_code)]

use forum::{config::Config, db, routes, seed, state::AppState};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: Some("root".to_string()),
        admin_email: Some("root@example.com".to_string()),
        admin_password: Some(PASSWORD.to_string()),
        seed_communities: false,
    }
}

/// Spawns the app on a random port against a fresh in-memory database.
/// An admin account `root` is seeded.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// A throwaway on-disk database, for tests that need several connections.
pub fn temp_database_url() -> (String, PathBuf) {
    let path = std::env::temp_dir().join(format!("forum-test-{}.db", uuid::Uuid::new_v4()));
    (format!("sqlite://{}?mode=rwc", path.display()), path)
}

pub fn remove_database(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to open database");

    db::migrate(&pool).await.expect("Failed to migrate database");

    seed::seed_admin_user(&pool, &config)
        .await
        .expect("Failed to seed admin");

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.post(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.delete(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let resp = self.get(path, None).await;
        assert_eq!(resp.status().as_u16(), 200, "GET {path}");
        resp.json().await.expect("Failed to parse json")
    }

    /// Registers `username` and returns its token.
    pub async fn register(&self, username: &str) -> String {
        let resp = self
            .post_json(
                "/api/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201, "register {username}");
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().expect("Token not found").to_string()
    }

    pub async fn login(&self, identifier: &str) -> String {
        let resp = self
            .post_json(
                "/api/auth/login",
                None,
                json!({ "identifier": identifier, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200, "login {identifier}");
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().expect("Token not found").to_string()
    }

    pub async fn create_community(&self, token: &str, name: &str) -> i64 {
        let resp = self
            .post_json("/api/communities", Some(token), json!({ "name": name }))
            .await;
        assert_eq!(resp.status().as_u16(), 201, "create community {name}");
        let body: Value = resp.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_post(&self, token: &str, title: &str, community_id: Option<i64>) -> i64 {
        let resp = self
            .post_json(
                "/api/posts",
                Some(token),
                json!({ "title": title, "body": "Content", "community_id": community_id }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201, "create post {title}");
        let body: Value = resp.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn comment(&self, token: &str, post_id: i64, body: &str) -> i64 {
        let resp = self
            .post_json(
                &format!("/api/posts/{post_id}/comments"),
                Some(token),
                json!({ "body": body }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201, "comment on {post_id}");
        let body: Value = resp.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }
}
