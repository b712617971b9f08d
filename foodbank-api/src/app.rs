/// Application state and router builder
///
/// # Router Structure
///
/// ```text
/// /health                          public
/// /v1/auth/{login,refresh}         public
/// /v1/clients[/:id]                JWT
/// /v1/parcels[/:id|/query|/ids|/live|/status|/delete]  JWT
/// /v1/lists[/:id|/swap]            JWT
/// /v1/collection-centres           JWT
/// /v1/website-data[/:name]         JWT
/// /v1/calendar                     JWT
/// /v1/pdfs/*                       JWT
/// /v1/admin/*                      JWT + admin role
/// ```
use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use foodbank_shared::{auth::middleware::authenticate_bearer, realtime::ChangeHub};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    /// Table change notifications from the database listener
    pub hub: ChangeHub,

    /// Cancelled when the server shuts down; ends live streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            hub: ChangeHub::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let client_routes = Router::new()
        .route(
            "/",
            get(routes::clients::list_clients).post(routes::clients::create_client),
        )
        .route(
            "/:id",
            get(routes::clients::get_client)
                .put(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        );

    let parcel_routes = Router::new()
        .route("/", post(routes::parcels::create_parcel))
        .route("/query", post(routes::parcels::query_parcels))
        .route("/ids", post(routes::parcels::matching_parcel_ids))
        .route("/live", get(routes::parcels::live_parcels))
        .route("/delete", post(routes::parcels::delete_parcels))
        .route("/status", post(routes::status::update_status))
        .route(
            "/:id",
            get(routes::parcels::get_parcel).put(routes::parcels::update_parcel),
        );

    let list_routes = Router::new()
        .route(
            "/",
            get(routes::lists::list_items).post(routes::lists::create_item),
        )
        .route("/swap", post(routes::lists::swap_items))
        .route(
            "/:id",
            put(routes::lists::update_item).delete(routes::lists::delete_item),
        );

    let centre_routes = Router::new().route(
        "/",
        get(routes::collection_centres::list_centres)
            .post(routes::collection_centres::create_centre),
    );

    let website_data_routes = Router::new()
        .route("/", get(routes::website_data::list_website_data))
        .route(
            "/:name",
            get(routes::website_data::get_website_data)
                .put(routes::website_data::update_website_data),
        );

    let pdf_routes = Router::new()
        .route("/shopping-lists", post(routes::pdfs::shopping_lists))
        .route("/shipping-labels", post(routes::pdfs::shipping_labels))
        .route("/driver-overview", post(routes::pdfs::driver_overview))
        .route("/day-overview", post(routes::pdfs::day_overview));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/create-user", post(routes::admin::create_user))
        .route("/update-user", post(routes::admin::update_user))
        .route("/delete-user", post(routes::admin::delete_user));

    let protected_routes = Router::new()
        .nest("/clients", client_routes)
        .nest("/parcels", parcel_routes)
        .nest("/lists", list_routes)
        .nest("/collection-centres", centre_routes)
        .nest("/website-data", website_data_routes)
        .route("/calendar", get(routes::calendar::calendar))
        .nest("/pdfs", pdf_routes)
        .nest("/admin", admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.api.cors_origins;

    // No configured origins, or an explicit "*", means development mode
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Validates the bearer token and stores the [`AuthContext`](foodbank_shared::auth::middleware::AuthContext)
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate_bearer(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
