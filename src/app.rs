use std::net::SocketAddr;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post, put, MethodRouter},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, books, state::AppState};

/// Who may reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
}

pub struct Binding {
    pub path: &'static str,
    pub access: Access,
    pub handler: MethodRouter<AppState>,
}

fn bind(path: &'static str, access: Access, handler: MethodRouter<AppState>) -> Binding {
    Binding {
        path,
        access,
        handler,
    }
}

/// Route table for everything under `/api/v1`.
pub fn bindings() -> Vec<Binding> {
    use Access::*;
    vec![
        bind("/auth/register", Public, post(auth::handlers::register)),
        bind("/auth/login", Public, post(auth::handlers::login)),
        bind("/auth/logout", Authenticated, post(auth::handlers::logout)),
        bind("/auth/me", Authenticated, get(auth::handlers::me)),
        bind(
            "/books",
            Authenticated,
            get(books::handlers::list_books).post(books::handlers::create_book),
        ),
        bind(
            "/books/:id/status",
            Authenticated,
            put(books::handlers::update_status),
        ),
        bind("/books/:id", Authenticated, delete(books::handlers::delete_book)),
    ]
}

/// Mounts each binding, composing the bearer-token guard in front of
/// authenticated handlers.
fn dispatch(state: &AppState, table: Vec<Binding>) -> Router<AppState> {
    table.into_iter().fold(Router::new(), |router, b| {
        let handler = match b.access {
            Access::Public => b.handler,
            Access::Authenticated => b.handler.route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::extractors::require_auth,
            )),
        };
        router.route(b.path, handler)
    })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "book-tracker" }))
}

fn cors(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
}

pub fn build_app(state: AppState) -> Router {
    let api = dispatch(&state, bindings());
    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
