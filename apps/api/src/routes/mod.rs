pub mod health;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::auth;
use crate::generation::handlers as generation_handlers;
use crate::preferences::handlers as preference_handlers;
use crate::profiles::handlers as profile_handlers;
use crate::proposals::handlers as proposal_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/logout", delete(auth::handlers::handle_logout))
        // Preferences (singleton per user)
        .route(
            "/api/v1/user_preference",
            get(preference_handlers::handle_show)
                .post(preference_handlers::handle_create)
                .patch(preference_handlers::handle_update)
                .delete(preference_handlers::handle_destroy),
        )
        // Profile (singleton per user)
        .route(
            "/api/v1/user_profile",
            get(profile_handlers::handle_show)
                .post(profile_handlers::handle_create)
                .patch(profile_handlers::handle_update),
        )
        // Proposals
        .route(
            "/api/v1/proposals",
            get(proposal_handlers::handle_index).post(proposal_handlers::handle_create),
        )
        .route(
            "/api/v1/proposals/:id",
            get(proposal_handlers::handle_show)
                .patch(proposal_handlers::handle_update)
                .delete(proposal_handlers::handle_destroy),
        )
        .route(
            "/api/v1/proposals/:id/generate",
            post(generation_handlers::handle_generate),
        )
        // Generated proposal versions
        .route(
            "/api/v1/generated_proposals/:id",
            get(generation_handlers::handle_get_generated)
                .patch(generation_handlers::handle_update_generated),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/signup", post(auth::handlers::handle_signup))
        .route("/api/v1/login", post(auth::handlers::handle_login))
        .merge(protected)
        .with_state(state)
}
