//! HTTP endpoints: landing page, city autocomplete and outfit recommendations.

use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use outfit_core::{OutfitService, RecommendationRequest, RecommendationResult, Suggestion};
use serde::Deserialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

const INDEX_HTML: &str = include_str!("../static/index.html");
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// JSON `{"error": ...}` with a failure status.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AutocompleteParams {
    #[serde(default)]
    q: String,
}

pub fn router(service: Arc<OutfitService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/autocomplete", get(autocomplete))
        .route("/get_recommendation", post(get_recommendation))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(addr: &str, service: Arc<OutfitService>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting outfit server");

    let purger = tokio::spawn(purge_periodically(service.clone()));
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purger.abort();
    tracing::info!("Server shut down");
    Ok(())
}

async fn purge_periodically(service: Arc<OutfitService>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        let purged = service.purge_caches();
        if purged > 0 {
            tracing::debug!(purged, "Evicted expired cache entries");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn autocomplete(
    State(service): State<Arc<OutfitService>>,
    Query(params): Query<AutocompleteParams>,
) -> Json<Vec<Suggestion>> {
    Json(service.autocomplete(&params.q).await)
}

async fn get_recommendation(
    State(service): State<Arc<OutfitService>>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<RecommendationResult>, ApiError> {
    let Json(request) = payload.inspect_err(|e| {
        tracing::warn!(error = %e.body_text(), "Rejected recommendation request");
    })?;
    Ok(Json(service.recommend(&request).await))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "internal error".to_string()
    };
    tracing::error!(error = %message, "Request handler panicked");

    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message,
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use outfit_core::{Config, ProviderId, RetryPolicy};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OUTFIT: &str = r#"{"headline":"Warm Layers","outfit_top":"Sweater","outfit_bottom":"Jeans","shoes":"Boots","accessories":["Scarf"],"reasoning":"Chilly"}"#;

    async fn app(server: &MockServer) -> Router {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::Gemini, "G_KEY".into());
        cfg.endpoints.openweather = server.uri();
        cfg.endpoints.geocoding = server.uri();
        cfg.endpoints.gemini = server.uri();
        cfg.retry = RetryPolicy::cyclic().without_delays();

        router(Arc::new(OutfitService::from_config(&cfg).unwrap()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/get_recommendation")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn index_serves_html() {
        let server = MockServer::start().await;
        let response = app(&server)
            .await
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("<html"));
    }

    #[tokio::test]
    async fn autocomplete_short_or_missing_query_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let app = app(&server).await;

        for uri in ["/autocomplete?q=a", "/autocomplete"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await, serde_json::json!([]));
        }
    }

    #[tokio::test]
    async fn autocomplete_returns_suggestions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"name": "Delhi", "country": "India", "admin1": "Delhi",
                             "latitude": 28.65, "longitude": 77.23}]
            })))
            .mount(&server)
            .await;

        let response = app(&server)
            .await
            .oneshot(Request::get("/autocomplete?q=Del").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            body_json(response).await,
            serde_json::json!([{"label": "Delhi, India (Delhi)", "lat": 28.65, "lon": 77.23}])
        );
    }

    #[tokio::test]
    async fn recommendation_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 200,
                "main": {"temp": 8.2, "feels_like": 5.9, "humidity": 81},
                "wind": {"speed": 4.0},
                "weather": [{"description": "broken clouds"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": format!("```json {OUTFIT} ```")}]}}]
            })))
            .mount(&server)
            .await;

        let response = app(&server)
            .await
            .oneshot(post_json(r#"{"city": "Berlin", "lat": 52.5, "lon": 13.4}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["weather"],
            serde_json::json!({"temp": 8, "feels_like": 6, "humidity": 81, "wind": 14, "condition": "Broken Clouds"})
        );
        assert_eq!(body["agent_response"], OUTFIT);
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let server = MockServer::start().await;
        let app = app(&server).await;

        let response = app.clone().oneshot(post_json(r#"{"city": "Pune"}"#)).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(body_json(response).await["error"].is_string());

        let response = app.oneshot(post_json("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    async fn boom() -> &'static str {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn panics_become_json_errors() {
        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, serde_json::json!({"error": "kaboom"}));
    }
}
