mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{bearer, create_category, create_task, default_app, register_and_login, test_state};

#[actix_rt::test]
async fn test_task_crud_flow() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "task_owner").await;

    let created = create_task(
        &app,
        &token,
        json!({ "title": "Write report", "description": "Quarterly numbers" }),
    )
    .await;
    assert_eq!(created["status"], "TODO");
    assert_eq!(created["priority"], "MEDIUM");
    assert_eq!(created["is_overdue"], false);
    let task_id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["title"], "Write report");

    // Partial update leaves the description alone
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Write final report", "priority": "HIGH" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["title"], "Write final report");
    assert_eq!(updated["priority"], "HIGH");
    assert_eq!(updated["description"], "Quarterly numbers");

    // Explicit null clears it
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .set_json(json!({ "description": null }))
        .to_request();
    let cleared: Value = test::call_and_read_body_json(&app, req).await;
    assert!(cleared["description"].is_null());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_tasks_are_isolated_between_users() {
    let app = default_app(test_state()).await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let task = create_task(&app, &alice, json!({ "title": "Alice's task" })).await;
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

    for req in [
        test::TestRequest::get().uri(&uri),
        test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "title": "Hijacked" })),
        test::TestRequest::delete().uri(&uri),
    ] {
        let resp = test::call_service(&app, req.insert_header(bearer(&bob)).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Task not found");
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks")
        .insert_header(bearer(&bob))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing["total"], 0);

    // Alice's task survived Bob's attempts
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["title"], "Alice's task");
}

#[actix_rt::test]
async fn test_task_listing_filters_and_pagination() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "lister").await;

    for i in 0..12 {
        let priority = if i % 3 == 0 { "URGENT" } else { "LOW" };
        create_task(
            &app,
            &token,
            json!({ "title": format!("Task {}", i), "priority": priority }),
        )
        .await;
    }
    create_task(
        &app,
        &token,
        json!({ "title": "Groceries", "description": "Buy MILK and eggs" }),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?skip=10&limit=5")
        .insert_header(bearer(&token))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 13);
    assert_eq!(page["page"], 3);
    assert_eq!(page["page_size"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 3);

    // Newest first by default
    let req = test::TestRequest::get()
        .uri("/api/v1/tasks")
        .insert_header(bearer(&token))
        .to_request();
    let first_page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first_page["items"].as_array().unwrap().len(), 10);
    assert_eq!(first_page["items"][0]["title"], "Groceries");

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?priority=URGENT")
        .insert_header(bearer(&token))
        .to_request();
    let urgent: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(urgent["total"], 4);

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?search=milk")
        .insert_header(bearer(&token))
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found["total"], 1);
    assert_eq!(found["items"][0]["title"], "Groceries");

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?limit=0")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?status=NOT_A_STATUS")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_status_filter_counts_only_matching_tasks() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "status_filter").await;

    create_task(&app, &token, json!({ "title": "First", "status": "TODO" })).await;
    create_task(&app, &token, json!({ "title": "Second", "status": "TODO" })).await;
    create_task(&app, &token, json!({ "title": "Done", "status": "COMPLETED" })).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?status=TODO")
        .insert_header(bearer(&token))
        .to_request();
    let todo: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(todo["total"], 2);
    let items = todo["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|task| task["status"] == "TODO"));
}

#[actix_rt::test]
async fn test_first_page_of_fifteen() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "fifteen").await;

    for i in 0..15 {
        create_task(&app, &token, json!({ "title": format!("Task {}", i) })).await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks?skip=0&limit=10")
        .insert_header(bearer(&token))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 10);
    assert_eq!(page["total"], 15);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 10);
    assert_eq!(page["total_pages"], 2);
}

#[actix_rt::test]
async fn test_due_date_range_filter() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "due_range").await;

    for (title, due) in [
        ("January", "2030-01-15T12:00:00Z"),
        ("February", "2030-02-15T12:00:00Z"),
        ("March", "2030-03-15T12:00:00Z"),
    ] {
        create_task(&app, &token, json!({ "title": title, "due_date": due })).await;
    }
    create_task(&app, &token, json!({ "title": "Someday" })).await;

    let list = |uri: &str| {
        test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token))
            .to_request()
    };

    let both: Value = test::call_and_read_body_json(
        &app,
        list("/api/v1/tasks?due_date_from=2030-02-01T00:00:00Z&due_date_to=2030-03-31T00:00:00Z"),
    )
    .await;
    assert_eq!(both["total"], 2);
    let mut titles: Vec<&str> = both["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["title"].as_str().unwrap())
        .collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["February", "March"]);

    // Bounds are inclusive and tasks without a due date never match
    let from: Value = test::call_and_read_body_json(
        &app,
        list("/api/v1/tasks?due_date_from=2030-03-15T12:00:00Z"),
    )
    .await;
    assert_eq!(from["total"], 1);
    assert_eq!(from["items"][0]["title"], "March");

    let to: Value = test::call_and_read_body_json(
        &app,
        list("/api/v1/tasks?due_date_to=2030-01-15T12:00:00Z"),
    )
    .await;
    assert_eq!(to["total"], 1);
    assert_eq!(to["items"][0]["title"], "January");
}

#[actix_rt::test]
async fn test_task_category_must_belong_to_owner() {
    let app = default_app(test_state()).await;
    let alice = register_and_login(&app, "cat_alice").await;
    let bob = register_and_login(&app, "cat_bob").await;

    let bobs_category = create_category(&app, &bob, "Bob only").await;
    let req = test::TestRequest::post()
        .uri("/api/v1/tasks")
        .insert_header(bearer(&alice))
        .set_json(json!({ "title": "Sneaky", "category_id": bobs_category["id"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Category not found");

    let work = create_category(&app, &alice, "Work").await;
    let task = create_task(
        &app,
        &alice,
        json!({ "title": "Filed", "category_id": work["id"] }),
    )
    .await;
    create_task(&app, &alice, json!({ "title": "Unfiled" })).await;

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/tasks?category_id={}",
            work["id"].as_str().unwrap()
        ))
        .insert_header(bearer(&alice))
        .to_request();
    let filtered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(filtered["total"], 1);
    assert_eq!(filtered["items"][0]["id"], task["id"]);

    // Filtering by someone else's category is a 404, not an empty page
    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/tasks?category_id={}",
            bobs_category["id"].as_str().unwrap()
        ))
        .insert_header(bearer(&alice))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Moving the task to Bob's category fails; clearing it works
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());
    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .set_json(json!({ "category_id": bobs_category["id"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .set_json(json!({ "category_id": null }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert!(updated["category_id"].is_null());
}

#[actix_rt::test]
async fn test_overdue_tasks_and_statistics() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "stats_user").await;

    let long_ago = Utc::now() - Duration::days(3);
    let yesterday = Utc::now() - Duration::days(1);
    let tomorrow = Utc::now() + Duration::days(1);

    let late = create_task(&app, &token, json!({ "title": "Late", "due_date": yesterday })).await;
    assert_eq!(late["is_overdue"], true);
    let later = create_task(&app, &token, json!({ "title": "Later", "due_date": long_ago })).await;
    create_task(&app, &token, json!({ "title": "Upcoming", "due_date": tomorrow })).await;
    let done = create_task(
        &app,
        &token,
        json!({ "title": "Done", "due_date": long_ago, "status": "COMPLETED" }),
    )
    .await;
    assert_eq!(done["is_overdue"], false);

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks/overdue")
        .insert_header(bearer(&token))
        .to_request();
    let overdue: Value = test::call_and_read_body_json(&app, req).await;
    let overdue = overdue.as_array().unwrap();
    assert_eq!(overdue.len(), 2);
    // Earliest due date first
    assert_eq!(overdue[0]["id"], later["id"]);
    assert_eq!(overdue[1]["id"], late["id"]);

    // Completing a task clears its overdue flag
    let req = test::TestRequest::patch()
        .uri(&format!(
            "/api/v1/tasks/{}/status?new_status=COMPLETED",
            late["id"].as_str().unwrap()
        ))
        .insert_header(bearer(&token))
        .to_request();
    let completed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(completed["status"], "COMPLETED");
    assert_eq!(completed["is_overdue"], false);

    let req = test::TestRequest::patch()
        .uri(&format!(
            "/api/v1/tasks/{}/priority?new_priority=URGENT",
            later["id"].as_str().unwrap()
        ))
        .insert_header(bearer(&token))
        .to_request();
    let urgent: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(urgent["priority"], "URGENT");

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks/statistics")
        .insert_header(bearer(&token))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        stats,
        json!({
            "total": 4,
            "by_status": { "todo": 2, "in_progress": 0, "completed": 2, "archived": 0 },
            "overdue": 1
        })
    );
}

#[actix_rt::test]
async fn test_overdue_count_is_not_capped_by_page_size() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "many_overdue").await;
    let yesterday = Utc::now() - Duration::days(1);

    for i in 0..12 {
        create_task(
            &app,
            &token,
            json!({ "title": format!("Overdue {}", i), "due_date": yesterday }),
        )
        .await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks/overdue")
        .insert_header(bearer(&token))
        .to_request();
    let overdue: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(overdue.as_array().unwrap().len(), 10);

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks/statistics")
        .insert_header(bearer(&token))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["overdue"], 12);
}

#[actix_rt::test]
async fn test_invalid_task_input() {
    let app = default_app(test_state()).await;
    let token = register_and_login(&app, "invalid_input").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/tasks")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get()
        .uri("/api/v1/tasks/not-a-uuid")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
