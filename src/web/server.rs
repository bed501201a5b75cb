// src/web/server.rs
//! Live map HTTP server

use super::{handlers, AppState};
use crate::error::Result;
use axum::{routing::get, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const DEFAULT_WEB_BIND: &str = "0.0.0.0:5000";

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/location", get(handlers::location))
        .route("/coords", get(handlers::location))
        .route("/readings", get(handlers::readings))
        .route("/update", get(handlers::update))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `bind_addr` and serve until Ctrl+C
pub async fn run_server(bind_addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Starting server on {}", listener.local_addr()?);

    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SharedState;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_routes_over_http() {
        let state = SharedState::default();
        let app = AppState {
            state: state.clone(),
            kml: None,
            safe_distance_cm: 15.0,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, app, async {
            let _ = rx.await;
        }));

        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let body = client
            .get(format!("{}/update?lat=51.5&lon=-0.12", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");

        let coords = client
            .get(format!("{}/coords", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let coords: serde_json::Value = serde_json::from_str(&coords).unwrap();
        assert_eq!(coords["lat"], 51.5);
        assert_eq!(coords["lon"], -0.12);
        assert_eq!(coords["path"], serde_json::json!([[51.5, -0.12]]));

        let page = client.get(&base).send().await.unwrap();
        assert!(page.status().is_success());

        let missing = client.get(format!("{}/nope", base)).send().await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(state.read(|s| s.has_fix()));
    }
}
