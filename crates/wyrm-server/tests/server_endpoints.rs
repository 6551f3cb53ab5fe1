use serde_json::Value;
use tokio::task::JoinHandle;
use wyrm_server::{AppConfig, build_app};

async fn start_server(cfg: AppConfig) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let (app, _oauth) = build_app(&cfg).expect("build app");

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn server_endpoints_work() {
    let mut cfg = AppConfig::default();
    cfg.proxy_auth.enabled = true;
    let (base, shutdown_tx, handle) = start_server(cfg).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    // GET /healthz
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Request ids are echoed
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-1");

    // GET /api/v1/me without a token
    let resp = client.get(format!("{base}/api/v1/me")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

    // GET /api/v1/whoami, anonymous and via the proxy header
    let body: Value = client
        .get(format!("{base}/api/v1/whoami"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["authenticated"], false);

    let body: Value = client
        .get(format!("{base}/api/v1/whoami"))
        .header("x-forwarded-user", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "alice");

    // Token endpoint answers OAuth errors as JSON
    let resp = client
        .post(format!("{base}/oauth/token"))
        .form(&[("grant_type", "password")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");

    // Authorization endpoint refuses a non-https client without fetching it
    let resp = client
        .get(format!(
            "{base}/oauth/authorize?response_type=code&client_id=http%3A%2F%2Fapp.example%2F&redirect_uri=http%3A%2F%2Fapp.example%2Fcb"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
