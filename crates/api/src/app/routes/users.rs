use axum::Json;
use axum::extract::{Path, State};

use forms_core::{User, UserId};

use crate::app::AppState;
use crate::context::CurrentUser;
use crate::errors::ApiError;

/// `GET /users/:user_id`. Any signed-in user may look up any other.
pub async fn get_user(
    State(state): State<AppState>,
    _viewer: CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let Ok(user_id) = user_id.parse::<UserId>() else {
        return Err(ApiError::not_found("User not found"));
    };

    state
        .users
        .find_by_id(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}
