// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    handlers::{auth, community, health, interaction, post, profile},
    state::AppState,
    utils::jwt::auth_middleware,
};

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Assembles the main application router.
///
/// * Public reads and the auth endpoints need no token.
/// * Every mutating route sits behind `auth_middleware`.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Logout validates its own token so that it stays idempotent.
        .route("/logout", post(auth::logout));

    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/communities", get(community::list_communities))
        .route("/communities/{id}", get(community::get_community))
        .route("/posts", get(post::list_posts))
        .route("/posts/{id}", get(post::get_post))
        .route("/posts/{id}/comments", get(interaction::list_comments));

    let protected_routes = Router::new()
        .route("/me", get(profile::get_me).patch(profile::update_me))
        .route("/communities", post(community::create_community))
        .route("/communities/{id}/join", post(community::join_community))
        .route("/communities/{id}/leave", post(community::leave_community))
        .route("/posts", post(post::create_post))
        .route("/posts/{id}", delete(post::delete_post))
        .route("/posts/{id}/like", post(interaction::toggle_post_like))
        .route("/posts/{id}/comments", post(interaction::create_comment))
        .route("/comments/{id}", delete(interaction::delete_comment))
        .route("/comments/{id}/replies", post(interaction::reply_comment))
        .route("/comments/{id}/like", post(interaction::toggle_comment_like))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes.merge(protected_routes))
        .fallback(not_found)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
