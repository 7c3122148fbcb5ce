use crate::{
    auth::ActiveUser,
    error::AppError,
    models::{
        OverdueQuery, PriorityQuery, StatusQuery, TaskInput, TaskQuery, TaskResponse, TaskUpdate,
    },
    state::AppState,
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

/// Retrieves a page of tasks for the authenticated user.
///
/// Tasks are ordered by creation date, newest first.
///
/// ## Query Parameters:
/// - `skip` (default 0), `limit` (1 to 100, default 10).
/// - `status` (optional): `TODO`, `IN_PROGRESS`, `COMPLETED` or `ARCHIVED`.
/// - `priority` (optional): `LOW`, `MEDIUM`, `HIGH` or `URGENT`.
/// - `category_id` (optional): Must be one of the caller's categories.
/// - `search` (optional): Case-insensitive match against title and description.
/// - `due_date_from` / `due_date_to` (optional): Inclusive due date range.
///
/// ## Responses:
/// - `200 OK`: `{items, total, page, page_size, total_pages}`.
/// - `401 Unauthorized`: If the request lacks a valid access token.
/// - `404 Not Found`: If `category_id` does not belong to the caller.
/// - `422 Unprocessable Entity`: If pagination or search limits are exceeded.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    user: ActiveUser,
    query_params: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    query_params.validate()?;

    let tasks = state
        .tasks
        .list(user.id, &query_params.filter(), query_params.page())
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task for the authenticated user.
///
/// ## Request Body:
/// - `title`: Required, 1 to 200 characters.
/// - `description` (optional).
/// - `status` / `priority` (optional): Default to `TODO` and `MEDIUM`.
/// - `due_date` (optional).
/// - `category_id` (optional): Must be one of the caller's categories.
///
/// ## Responses:
/// - `201 Created`: The new task, including `is_overdue`.
/// - `404 Not Found`: If the category does not belong to the caller.
/// - `422 Unprocessable Entity`: If input validation fails.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = state.tasks.create(user.id, task_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(TaskResponse::from(task)))
}

/// Unfinished tasks whose due date has passed, earliest due date first.
#[get("/overdue")]
pub async fn get_overdue_tasks(
    state: web::Data<AppState>,
    user: ActiveUser,
    query_params: web::Query<OverdueQuery>,
) -> Result<impl Responder, AppError> {
    query_params.validate()?;

    let tasks: Vec<TaskResponse> = state
        .tasks
        .overdue(user.id, query_params.page())
        .await?
        .into_iter()
        .map(TaskResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/statistics")]
pub async fn get_task_statistics(
    state: web::Data<AppState>,
    user: ActiveUser,
) -> Result<impl Responder, AppError> {
    let statistics = state.tasks.statistics(user.id).await?;
    Ok(HttpResponse::Ok().json(statistics))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: The task, if owned by the caller.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = state.tasks.get(user.id, task_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TaskResponse::from(task)))
}

/// Updates an existing task.
///
/// Only the fields present in the body change. Sending `"category_id": null`
/// detaches the task from its category.
///
/// ## Responses:
/// - `200 OK`: The updated task.
/// - `404 Not Found`: If the task, or a newly referenced category, is not the caller's.
/// - `422 Unprocessable Entity`: If input validation fails.
#[put("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = state
        .tasks
        .update(user.id, task_id.into_inner(), task_data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(TaskResponse::from(task)))
}

/// Deletes a task by its ID.
///
/// ## Responses:
/// - `204 No Content`: On successful deletion.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    state.tasks.delete(user.id, task_id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[patch("/{id}/status")]
pub async fn update_task_status(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_id: web::Path<Uuid>,
    query: web::Query<StatusQuery>,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .update_status(user.id, task_id.into_inner(), query.new_status)
        .await?;
    Ok(HttpResponse::Ok().json(TaskResponse::from(task)))
}

#[patch("/{id}/priority")]
pub async fn update_task_priority(
    state: web::Data<AppState>,
    user: ActiveUser,
    task_id: web::Path<Uuid>,
    query: web::Query<PriorityQuery>,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .update_priority(user.id, task_id.into_inner(), query.new_priority)
        .await?;
    Ok(HttpResponse::Ok().json(TaskResponse::from(task)))
}
