use crate::{
    auth::ActiveUser,
    error::AppError,
    models::{CategoryInput, CategoryListQuery, CategoryUpdate},
    state::AppState,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

/// Lists the caller's categories, newest first.
///
/// ## Query Parameters:
/// - `skip` (default 0) and `limit` (1 to 100, default 100).
#[get("")]
pub async fn list_categories(
    state: web::Data<AppState>,
    user: ActiveUser,
    query: web::Query<CategoryListQuery>,
) -> Result<impl Responder, AppError> {
    query.validate()?;

    let categories = state.categories.list(user.id, query.page()).await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// Creates a category. Names are unique per user (`409 Conflict` otherwise) and the
/// color defaults to `#3B82F6`.
#[post("")]
pub async fn create_category(
    state: web::Data<AppState>,
    user: ActiveUser,
    input: web::Json<CategoryInput>,
) -> Result<impl Responder, AppError> {
    input.validate()?;

    let category = state.categories.create(user.id, input.into_inner()).await?;
    Ok(HttpResponse::Created().json(category))
}

#[get("/{id}")]
pub async fn get_category(
    state: web::Data<AppState>,
    user: ActiveUser,
    category_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let category = state
        .categories
        .get(user.id, category_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(category))
}

#[put("/{id}")]
pub async fn update_category(
    state: web::Data<AppState>,
    user: ActiveUser,
    category_id: web::Path<Uuid>,
    update: web::Json<CategoryUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;

    let category = state
        .categories
        .update(user.id, category_id.into_inner(), update.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(category))
}

/// Deletes a category. Its tasks are kept without a category.
#[delete("/{id}")]
pub async fn delete_category(
    state: web::Data<AppState>,
    user: ActiveUser,
    category_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    state
        .categories
        .delete(user.id, category_id.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/{id}/stats")]
pub async fn category_stats(
    state: web::Data<AppState>,
    user: ActiveUser,
    category_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let stats = state
        .categories
        .stats(user.id, category_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(stats))
}
