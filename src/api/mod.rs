pub mod helpers;
pub mod smtp;

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::store::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(smtp::router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
