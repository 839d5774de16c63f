use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::CorsLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use harmonia_db::AppState;

mod api;
mod auth;
mod error;
mod service;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_config = harmonia_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = harmonia_db::connect(&db_config)
        .await
        .expect("failed to connect to database");

    tracing::info!("running database migrations...");
    harmonia_migration::Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations complete");

    let jwt_secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-me-in-production".to_string());

    // SECURITY: refuse to ship the fallback secret to production
    if jwt_secret == "dev-secret-change-me-in-production" {
        tracing::error!(
            "JWT_SECRET is set to the default value! \
             Set JWT_SECRET to a strong random string (>=32 chars) in production."
        );
        if std::env::var("HARMONIA_ENV").unwrap_or_default() == "production" {
            panic!("Refusing to start: JWT_SECRET must be set to a secure value in production.");
        }
    }

    let state = Arc::new(AppState { db, jwt_secret });

    // Rate limiter for auth endpoints: 10 requests per 60 seconds per IP
    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
            .expect("failed to build rate limiter config"),
    );

    // Auth routes (public, rate-limited)
    let auth_public = Router::new()
        .route("/register", post(auth::routes::register))
        .route("/login", post(auth::routes::login))
        .route("/refresh", post(auth::routes::refresh))
        .layer(GovernorLayer::new(auth_governor_conf));

    // Auth routes (protected)
    let auth_protected = Router::new()
        .route("/me", get(auth::routes::me))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    // Public reads. Claims are attached opportunistically so plays get
    // attributed and private playlists resolve for their owner.
    let public_api = Router::new()
        .route("/artists", get(api::artists::list_artists))
        .route("/artists/trending", get(api::artists::trending_artists))
        .route("/artists/top", get(api::artists::top_artists))
        .route("/artists/{id}", get(api::artists::get_artist))
        .route("/artists/{id}/songs", get(api::artists::artist_songs))
        .route("/artists/{id}/albums", get(api::artists::artist_albums))
        .route(
            "/artists/{id}/statistics",
            get(api::artists::artist_statistics),
        )
        .route("/albums", get(api::albums::list_albums))
        .route("/albums/{id}", get(api::albums::get_album))
        .route("/albums/{id}/songs", get(api::albums::album_songs))
        .route("/songs", get(api::songs::list_songs))
        .route("/songs/{id}", get(api::songs::get_song))
        .route("/songs/{id}/play", post(api::songs::play_song))
        .route("/playlists", get(api::playlists::list_playlists))
        .route("/playlists/{id}", get(api::playlists::get_playlist))
        .route("/search", get(api::search::search))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::optional_auth,
        ));

    // Catalog mutations (auth required)
    let protected_api = Router::new()
        .route("/artists", post(api::artists::create_artist))
        .route(
            "/artists/{id}",
            put(api::artists::update_artist).delete(api::artists::delete_artist),
        )
        .route("/artists/{id}/restore", post(api::artists::restore_artist))
        .route("/albums", post(api::albums::create_album))
        .route(
            "/albums/{id}",
            put(api::albums::update_album).delete(api::albums::delete_album),
        )
        .route("/albums/{id}/restore", post(api::albums::restore_album))
        .route(
            "/albums/{id}/recalculate",
            post(api::albums::recalculate_album),
        )
        .route("/songs", post(api::songs::create_song))
        .route(
            "/songs/{id}",
            put(api::songs::update_song).delete(api::songs::delete_song),
        )
        .route("/songs/{id}/restore", post(api::songs::restore_song))
        .route(
            "/songs/{id}/like",
            post(api::songs::like_song).delete(api::songs::unlike_song),
        )
        .route("/playlists", post(api::playlists::create_playlist))
        .route(
            "/playlists/{id}",
            put(api::playlists::update_playlist).delete(api::playlists::delete_playlist),
        )
        .route(
            "/playlists/{id}/restore",
            post(api::playlists::restore_playlist),
        )
        .route("/playlists/{id}/songs", post(api::playlists::add_playlist_song))
        .route(
            "/playlists/{id}/songs/{song_id}",
            delete(api::playlists::remove_playlist_song),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .merge(public_api)
        .merge(protected_api);

    // CORS configuration — restrict to configured origins
    let cors = {
        let allowed_origins = std::env::var("CORS_ORIGINS").unwrap_or_default();
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
            .collect();
        if origins.is_empty() {
            tracing::warn!(
                "CORS_ORIGINS not set — cross-origin requests are refused. \
                 Set CORS_ORIGINS=http://localhost:3000 for dev."
            );
            CorsLayer::new()
        } else {
            tracing::info!("CORS allowed origins: {:?}", origins);
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
        }
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server started");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await.unwrap(),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
