//! HTTP handlers for the category registry.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    app_state::LedgerState,
    auth::UserIdentity,
    category::{
        Category, CategoryName, CategoryType, create_category, delete_category, get_category,
        list_categories,
    },
    database_id::CategoryId,
};

/// The body of a request to create a category.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
}

/// Handler for listing the user's categories.
pub async fn get_categories_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    list_categories(identity.user_id, &connection).map(Json)
}

/// Handler for creating a category, responds with 201 and the new category.
pub async fn create_category_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let Json(request) = payload?;
    let name = CategoryName::new(&request.name)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(
        identity.user_id,
        name,
        request.category_type,
        OffsetDateTime::now_utc(),
        &connection,
    )?;
    tracing::info!("Created category {}", category.id);

    Ok((StatusCode::CREATED, Json(category)))
}

/// Handler for fetching one of the user's categories.
pub async fn get_category_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    Path(category_id): Path<String>,
) -> Result<Json<Category>, Error> {
    let category_id: CategoryId = category_id.parse()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_category(identity.user_id, category_id, &connection).map(Json)
}

/// Handler for deleting a category that no transaction references.
pub async fn delete_category_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    Path(category_id): Path<String>,
) -> Result<StatusCode, Error> {
    let category_id: CategoryId = category_id.parse()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_category(identity.user_id, category_id, &connection)?;
    tracing::info!("Deleted category {category_id}");

    Ok(StatusCode::NO_CONTENT)
}
