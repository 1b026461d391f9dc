use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/scenes", get(handlers::scenes))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics).with_state(state))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use modis_runner_core::{load_config_from_str, SceneRegistries};
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[runner]
station = "norrkoping"

[messaging]
subscribe_addresses = ["localhost:9000"]

[paths]
level1b_home = "/data/modis/level1"
attitude_home = "/data/modis/att"
ephemeris_home = "/data/modis/eph"

[executables]
modis_l1a = "/opt/ocssw/bin/modis_L1A"
modis_geo = "/opt/ocssw/bin/modis_GEO"
modis_l1b = "/opt/ocssw/bin/modis_L1B"
spa_home = "/opt/spa"

[ancillary]
dir = "/opt/ocssw/var/modis"
url = "https://oceandata.sci.gsfc.nasa.gov/Ancillary/LUTs/modis/"
"#;

    fn state() -> Arc<AppState> {
        let config = Arc::new(load_config_from_str(CONFIG).unwrap());
        let registries = Arc::new(RwLock::new(SceneRegistries::new()));
        Arc::new(AppState::new(config, registries, "test"))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = create_router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["station"], "norrkoping");
    }

    #[tokio::test]
    async fn test_scenes_empty() {
        let (status, json) = get_json("/api/v1/scenes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["pending"], 0);
        assert_eq!(json["running"], 0);
        assert!(json["scenes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let response = create_router(state())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("modis_runner_"));
    }
}
