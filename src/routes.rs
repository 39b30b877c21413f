// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, comments, reviews, taxonomy, titles, users},
    models::taxonomy::{Category, Genre},
    policy::{admin_only, admin_or_read_only, authenticated, author_or_read_only},
    state::AppState,
    utils::jwt::authenticate,
};

/// Assembles the main application router.
///
/// * Mounts every resource under `/api/v1`.
/// * Attaches the permission guard of each resource group.
/// * Applies global middleware (authentication, Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/token", post(auth::obtain_token));

    let catalog_routes = Router::new()
        .route(
            "/categories",
            get(taxonomy::list::<Category>).post(taxonomy::create::<Category>),
        )
        .route("/categories/{slug}", delete(taxonomy::delete::<Category>))
        .route(
            "/genres",
            get(taxonomy::list::<Genre>).post(taxonomy::create::<Genre>),
        )
        .route("/genres/{slug}", delete(taxonomy::delete::<Genre>))
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/{title_id}",
            get(titles::get_title)
                .patch(titles::update_title)
                .delete(titles::delete_title),
        )
        .route_layer(middleware::from_fn(admin_or_read_only));

    let feedback_routes = Router::new()
        .route(
            "/titles/{title_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route_layer(middleware::from_fn(author_or_read_only));

    // Static `/users/me` takes priority over `/users/{username}`.
    let me_routes = Router::new()
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route_layer(middleware::from_fn(authenticated));

    let user_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{username}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(middleware::from_fn(admin_only));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .merge(catalog_routes)
        .merge(feedback_routes)
        .merge(me_routes)
        .merge(user_routes);

    Router::new()
        .nest("/api/v1", api)
        // Global Middleware (the last layer added runs first)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
