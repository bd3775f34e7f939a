use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{admin, highlights, posts};

async fn health() -> &'static str {
    "ok"
}

/// Full application router. Layers such as CORS and tracing are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/reset", post(auth::request_reset))
        .route("/auth/reset/confirm", post(auth::confirm_reset))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/me", get(auth::me).patch(auth::update_me))
        .route("/posts", get(posts::feed).post(posts::create_post))
        .route("/posts/mine", get(posts::my_posts).delete(posts::delete_my_posts))
        .route(
            "/posts/{post_id}",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{post_id}/highlights", post(highlights::toggle_highlight))
        .route("/posts/{post_id}/comments", post(highlights::add_comment))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/phase", put(admin::set_user_phase))
        .route("/admin/users/{user_id}/admin", put(admin::set_user_admin))
        .route("/admin/phase", post(admin::bulk_set_phase))
        .route("/admin/posts", get(admin::list_posts))
        .route(
            "/admin/posts/{post_id}",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/admin/delete-user", post(admin::delete_user))
        .route("/admin/delete-user-posts", post(admin::delete_posts_of_user))
        .route("/admin/delete-all", post(admin::delete_all))
        .route("/admin/export.csv", get(admin::export_csv))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
