#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use building_asset_api::{app, config::AppConfig, AppState};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

/// One in-process server with its own in-memory store
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn api(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// Log in and return the access token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.api("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("login response without access_token")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_USER, ADMIN_PASSWORD).await
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.api(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.post(self.api(path)).bearer_auth(token).json(&body)
    }

    pub fn put(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.put(self.api(path)).bearer_auth(token).json(&body)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.api(path)).bearer_auth(token)
    }

    /// Id of the role with exactly this code
    pub async fn role_id(&self, admin: &str, code: &str) -> Result<i64> {
        let roles: Value = self.get(&format!("/roles?code={}", code), admin).send().await?.json().await?;
        roles["data"]["items"]
            .as_array()
            .and_then(|items| items.iter().find(|r| r["code"] == code))
            .and_then(|r| r["id"].as_i64())
            .with_context(|| format!("role {} missing", code))
    }

    /// Id of the user with exactly this username
    pub async fn user_id(&self, admin: &str, username: &str) -> Result<i64> {
        let users: Value = self
            .get(&format!("/users?username={}", username), admin)
            .send()
            .await?
            .json()
            .await?;
        users["data"]["items"]
            .as_array()
            .and_then(|items| items.iter().find(|u| u["username"] == username))
            .and_then(|u| u["id"].as_i64())
            .with_context(|| format!("user {} missing", username))
    }

    /// Create a user holding the seeded `user` role and return its token
    pub async fn reader_token(&self, admin: &str, username: &str) -> Result<String> {
        let role_id = self.role_id(admin, "user").await?;

        let res = self
            .post(
                "/users",
                admin,
                json!({ "username": username, "password": "reader-pass", "role_ids": [role_id] }),
            )
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "user create failed: {}", res.status());

        self.login(username, "reader-pass").await
    }
}

/// Start the router on a free port with the in-memory store, seeded
pub async fn spawn_app() -> Result<TestServer> {
    spawn_with(AppConfig::in_memory()).await
}

pub async fn spawn_with(mut config: AppConfig) -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    config.server.port = port;
    let bind_addr = config.bind_address();

    let state = AppState::connect(config).await?;
    state.bootstrap().seed().await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tokio::spawn(async move {
        let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            eprintln!("test server stopped: {}", e);
        }
    });

    let server = TestServer {
        base_url: format!("http://{}", bind_addr),
        client: reqwest::Client::new(),
    };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}

/// `data` of a success envelope, asserting the status on the way
pub async fn data(res: reqwest::Response, expected: StatusCode) -> Result<Value> {
    let status = res.status();
    let body: Value = res.json().await?;
    anyhow::ensure!(status == expected, "expected {}, got {}: {}", expected, status, body);
    Ok(body["data"].clone())
}
