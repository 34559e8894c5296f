// Korean Temple Map - Web Server
// Map page + JSON API with Axum

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use temple_map::{
    affiliations, build_map, page::MAP_JS, AffiliationOrder, BarChart, Config, Dataset,
    DatasetCache, MapOptions, MapOutcome, Selection, Summary, TempleRecord,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    cache: Arc<DatasetCache>,
    config: Arc<Config>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Handler error: status + message, rendered through ApiResponse
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiResponse::<()>::err(self.1))).into_response()
    }
}

/// Health response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    source: String,
    records: usize,
    unmappable: usize,
    fingerprint: String,
    loaded_at: String,
}

/// One selectable affiliation, with its marker style
#[derive(Serialize)]
struct AffiliationResponse {
    name: String,
    count: usize,
    color: String,
    glyph: String,
}

/// `?affiliations=a&affiliations=b&order=...`; absent = all, one empty value = none
#[derive(Default)]
struct SelectionQuery {
    affiliations: Option<Vec<String>>,
    order: Option<String>,
}

impl SelectionQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = SelectionQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "affiliations" => query.affiliations.get_or_insert_with(Vec::new).push(value),
                "order" => query.order = Some(value),
                _ => {}
            }
        }
        query
    }

    fn selection(&self) -> Selection {
        Selection::from_query(self.affiliations.as_ref())
    }

    fn order(&self) -> AffiliationOrder {
        self.order
            .as_deref()
            .and_then(AffiliationOrder::parse)
            .unwrap_or_default()
    }
}

impl AppState {
    fn map_options(&self, order: AffiliationOrder) -> MapOptions {
        MapOptions {
            zoom: self.config.zoom,
            order,
            ..MapOptions::default()
        }
    }

    /// Cached dataset; loads on the blocking pool if the cache is empty
    async fn dataset(&self) -> Result<Arc<Dataset>, ApiError> {
        if let Some(dataset) = self.cache.current() {
            return Ok(dataset);
        }

        let cache = Arc::clone(&self.cache);
        let source = self.config.data.clone();
        tokio::task::spawn_blocking(move || cache.get_or_load(&source))
            .await
            .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to load temple data");
                ApiError(StatusCode::BAD_GATEWAY, e.to_string())
            })
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check + dataset provenance
async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dataset = state.dataset().await?;

    Ok(Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        version: temple_map::VERSION,
        source: dataset.source.clone(),
        records: dataset.len(),
        unmappable: dataset.unmappable,
        fingerprint: dataset.fingerprint.clone(),
        loaded_at: dataset.loaded_at.to_rfc3339(),
    })))
}

/// GET /api/affiliations?order=alpha|frequency - Selectable universe
async fn get_affiliations(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = SelectionQuery::from_pairs(pairs);
    let dataset = state.dataset().await?;
    let options = state.map_options(query.order());
    let summary = Summary::compute(&dataset, &Selection::All);

    let response: Vec<AffiliationResponse> = affiliations(&dataset.records, options.order)
        .into_iter()
        .map(|name| {
            let icon = options.style.icon_for(&name);
            AffiliationResponse {
                count: summary.by_affiliation.get(&name).unwrap_or(0),
                color: icon.color.clone(),
                glyph: icon.glyph.clone(),
                name,
            }
        })
        .collect();

    Ok(Json(ApiResponse::ok(response)))
}

/// GET /api/records - All temple records
async fn get_records(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dataset = state.dataset().await?;
    Ok(Json(ApiResponse::ok(dataset.records.clone())))
}

/// GET /api/affiliations/:name/records - Records of one affiliation
async fn get_affiliation_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = state.dataset().await?;

    // Path has already percent-decoded the name
    let records: Vec<TempleRecord> = dataset
        .records
        .iter()
        .filter(|r| r.affiliation == name)
        .cloned()
        .collect();

    if records.is_empty() {
        return Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("unknown affiliation: {}", name),
        ));
    }

    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/map?affiliations=a&affiliations=b - Map view (or warning) for a selection
async fn get_map(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = SelectionQuery::from_pairs(pairs);
    let dataset = state.dataset().await?;
    let outcome = build_map(&dataset, &query.selection(), &state.map_options(query.order()));

    if let Some(warning) = outcome.warning() {
        tracing::debug!(warning, "map not built");
    }

    Ok(Json(ApiResponse::<MapOutcome>::ok(outcome)))
}

/// GET /api/summary?affiliations=a&affiliations=b - Counts and frequency tables
async fn get_summary(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = SelectionQuery::from_pairs(pairs);
    let dataset = state.dataset().await?;
    Ok(Json(ApiResponse::ok(Summary::compute(&dataset, &query.selection()))))
}

/// GET /api/charts/:file - affiliation.svg | province.svg
async fn get_chart(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let dataset = state.dataset().await?;
    let summary = Summary::compute(&dataset, &Selection::All);

    let chart = match file.as_str() {
        "affiliation.svg" => BarChart::by_affiliation(&summary),
        "province.svg" => BarChart::by_province(&summary),
        "affiliation.json" => return Ok(Json(ApiResponse::ok(BarChart::by_affiliation(&summary))).into_response()),
        "province.json" => return Ok(Json(ApiResponse::ok(BarChart::by_province(&summary))).into_response()),
        _ => return Err(ApiError(StatusCode::NOT_FOUND, format!("unknown chart: {}", file))),
    };

    Ok(([(header::CONTENT_TYPE, "image/svg+xml; charset=utf-8")], chart.to_svg()).into_response())
}

/// POST /api/reload - Drop the cached table and fetch it again
async fn reload(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.cache.invalidate();
    tracing::info!(source = %state.config.data, "reloading temple data");

    let dataset = state.dataset().await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "records": dataset.len(),
        "fingerprint": dataset.fingerprint,
    }))))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /static/map.js - Leaflet glue shared with the exported page
async fn serve_map_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], MAP_JS)
}

fn build_router(state: AppState) -> Router {
    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/affiliations", get(get_affiliations))
        .route("/affiliations/:name/records", get(get_affiliation_records))
        .route("/records", get(get_records))
        .route("/map", get(get_map))
        .route("/summary", get(get_summary))
        .route("/charts/:file", get(get_chart))
        .route("/reload", post(reload))
        .with_state(state);

    // Build main router
    Router::new()
        .route("/", get(serve_index))
        .route("/static/map.js", get(serve_map_js))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("🌐 Korean Temple Map - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env();
    let state = AppState {
        cache: Arc::new(DatasetCache::new()),
        config: Arc::new(config.clone()),
    };

    // Load once up front: no data, no server
    println!("📂 Loading temples from {}", config.data);
    match state.dataset().await {
        Ok(dataset) => println!(
            "✓ Loaded {} temples ({} without coordinates)",
            dataset.len(),
            dataset.unmappable
        ),
        Err(ApiError(_, message)) => {
            eprintln!("❌ Could not load temple data: {}", message);
            eprintln!("   Set TEMPLE_MAP_DATA to a reachable URL or a local CSV path.");
            std::process::exit(1);
        }
    }

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;

    println!("\n🚀 Server running on http://{}", config.bind);
    println!("   API: http://{}/api/map", config.bind);
    println!("   UI:  http://{}", config.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use temple_map::{parse_csv, DataSource};
    use tower::ServiceExt;

    const SAMPLE: &str = "사찰명,구분,시도,상세주소,Latitude,Longitude,소속단체(종단)\n\
        a,전통사찰,서울특별시,주소1,1,1,A\n\
        b,전통사찰,경기도,주소2,2,2,B\n\
        c,전통사찰,경기도,주소3,3,3,A\n\
        d,전통사찰,강원도,주소4,,,대한불교 조계종\n";

    const ODD_NAMES: &str = "사찰명,구분,시도,상세주소,Latitude,Longitude,소속단체(종단)\n\
        a,전통사찰,서울특별시,주소1,1,1,A%20B\n\
        b,전통사찰,경기도,주소2,2,2,\"천태종, 관음종\"\n\
        c,전통사찰,경기도,주소3,3,3,천태종\n";

    fn state_with(csv: &'static str) -> AppState {
        let config = Config {
            data: DataSource::parse("fixture.csv"),
            ..Config::default()
        };
        let cache = DatasetCache::new();
        cache
            .get_or_load_with(&config.data, |s| parse_csv(csv.as_bytes(), &s.to_string()))
            .unwrap();

        AppState {
            cache: Arc::new(cache),
            config: Arc::new(config),
        }
    }

    fn test_state() -> AppState {
        state_with(SAMPLE)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        get_json_from(test_state(), uri).await
    }

    async fn get_json_from(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_dataset() {
        let (status, json) = get_json("/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["records"], 4);
        assert_eq!(json["data"]["unmappable"], 1);
        assert_eq!(json["data"]["source"], "fixture.csv");
    }

    #[tokio::test]
    async fn test_map_for_subset() {
        let (status, json) = get_json("/api/map?affiliations=A").await;

        assert_eq!(status, StatusCode::OK);
        let data = &json["data"];
        assert_eq!(data["status"], "map");
        assert_eq!(data["center"][0], 2.0);
        assert_eq!(data["center"][1], 2.0);
        assert_eq!(data["groups"].as_array().unwrap().len(), 1);
        assert_eq!(data["groups"][0]["markers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_map_defaults_to_all() {
        let (_, json) = get_json("/api/map").await;
        let groups = json["data"]["groups"].as_array().unwrap();
        let markers: usize = groups
            .iter()
            .map(|g| g["markers"].as_array().unwrap().len())
            .sum();

        assert_eq!(markers, 3);
        assert_eq!(json["data"]["skipped"], 1);
    }

    #[tokio::test]
    async fn test_map_empty_selection_warns() {
        let (status, json) = get_json("/api/map?affiliations=").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "empty");
        assert_eq!(json["data"]["warning"], temple_map::EMPTY_SELECTION_WARNING);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let (_, json) = get_json("/api/summary?affiliations=B").await;
        let data = &json["data"];

        assert_eq!(data["total"], 4);
        assert_eq!(data["filtered"], 1);
        assert_eq!(data["by_affiliation"]["entries"][0][0], "A");
        assert_eq!(data["by_affiliation"]["entries"][0][1], 2);
    }

    #[tokio::test]
    async fn test_affiliations_by_frequency() {
        let (_, json) = get_json("/api/affiliations?order=frequency").await;
        let names: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();

        assert_eq!(names, vec!["A", "B", "대한불교 조계종"]);
        assert_eq!(json["data"][0]["color"], "green");
    }

    #[tokio::test]
    async fn test_affiliation_records_decodes_name() {
        let (status, json) = get_json("/api/affiliations/%EB%8C%80%ED%95%9C%EB%B6%88%EA%B5%90%20%EC%A1%B0%EA%B3%84%EC%A2%85/records").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["name"], "d");

        let (status, json) = get_json("/api/affiliations/none/records").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_affiliation_records_name_with_percent() {
        let (status, json) =
            get_json_from(state_with(ODD_NAMES), "/api/affiliations/A%2520B/records").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["name"], "a");
        assert_eq!(json["data"][0]["affiliation"], "A%20B");
    }

    #[tokio::test]
    async fn test_map_repeated_affiliations() {
        let (_, json) = get_json("/api/map?affiliations=A&affiliations=B").await;
        let groups: Vec<&str> = json["data"]["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["name"].as_str().unwrap())
            .collect();

        assert_eq!(groups, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_summary_name_with_comma() {
        let (_, json) = get_json_from(
            state_with(ODD_NAMES),
            "/api/summary?affiliations=%EC%B2%9C%ED%83%9C%EC%A2%85%2C%20%EA%B4%80%EC%9D%8C%EC%A2%85",
        )
        .await;

        assert_eq!(json["data"]["total"], 3);
        assert_eq!(json["data"]["filtered"], 1);
    }

    #[tokio::test]
    async fn test_chart_svg() {
        let response = build_router(test_state())
            .oneshot(Request::builder().uri("/api/charts/province.svg").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "image/svg+xml; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let svg = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(svg.matches("<rect").count(), 3);

        let (status, _) = get_json("/api/charts/pie.svg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reload_failure_reports_error() {
        // fixture.csv does not exist on disk, so a real reload fails
        let response = build_router(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_index_served() {
        let response = build_router(test_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
