//! User profile routes.

use axum::extract::{Path, State};
use axum::Json;
use database::validation::require_opt;
use database::{user, User, UserUpdate};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Envelope;
use crate::error::Result;
use crate::extract::JsonBody;
use crate::state::AppState;

/// Body of `POST /api/users/upsert`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

/// Body of `PUT /api/users/:id`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

/// Create a user or rename the one holding the phone number.
pub async fn upsert(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UpsertRequest>,
) -> Result<Json<Envelope<UserBody>>> {
    let name = require_opt("name", req.name.as_deref())?;
    let phone_number = require_opt("phoneNumber", req.phone_number.as_deref())?;

    let user = user::upsert_user(state.db().pool(), name, phone_number).await?;
    info!(user_id = %user.id, phone = %user.phone_number, "Upserted user");

    Ok(Json(Envelope::ok(UserBody { user })))
}

/// Update a user's name and/or phone number.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateRequest>,
) -> Result<Json<Envelope<UserBody>>> {
    let update = UserUpdate {
        name: req.name.as_deref(),
        phone_number: req.phone_number.as_deref(),
    };

    let user = user::update_user(state.db().pool(), &id, update).await?;
    info!(user_id = %user.id, "Updated user");

    Ok(Json(Envelope::ok(UserBody { user })))
}
