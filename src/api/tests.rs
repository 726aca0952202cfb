use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tower::ServiceExt;

use crate::services::session::{AnswerValue, SessionController, SessionTimers};
use crate::test_support;

fn rfc3339(value: OffsetDateTime) -> String {
    value.replace_nanosecond(0).expect("nanoseconds").format(&Rfc3339).expect("format")
}

/// Reference exam used across the flow tests: three objective questions
/// worth 2, 3 and 5 points plus one open-ended question worth 10.
fn exam_payload(duration_minutes: i64) -> serde_json::Value {
    let now = OffsetDateTime::now_utc();

    json!({
        "title": "Rust fundamentals",
        "description": "Ownership, borrowing and the basics",
        "duration_minutes": duration_minutes,
        "start_date": rfc3339(now - Duration::hours(1)),
        "end_date": rfc3339(now + Duration::hours(2)),
        "questions": [
            {
                "question_text": "Which keyword declares an immutable binding?",
                "question_type": "multiple_choice",
                "points": 2,
                "options": [
                    { "option_text": "let", "is_correct": true },
                    { "option_text": "mut", "is_correct": false },
                    { "option_text": "static", "is_correct": false },
                    { "option_text": "const", "is_correct": false }
                ]
            },
            {
                "question_text": "Rust has a garbage collector.",
                "question_type": "true_false",
                "points": 3,
                "options": [
                    { "option_text": "True", "is_correct": false },
                    { "option_text": "False", "is_correct": true }
                ]
            },
            {
                "question_text": "Which trait provides the clone method?",
                "question_type": "multiple_choice",
                "points": 5,
                "options": [
                    { "option_text": "Copy", "is_correct": false },
                    { "option_text": "Clone", "is_correct": true },
                    { "option_text": "Debug", "is_correct": false }
                ]
            },
            {
                "question_text": "Explain ownership in your own words.",
                "question_type": "open_ended",
                "points": 10,
                "options": []
            }
        ]
    })
}

async fn create_exam(app: Router, token: &str, payload: serde_json::Value) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(Method::POST, "/api/v1/exams", Some(token), Some(payload)))
        .await
        .expect("create exam");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    body
}

async fn start_session(app: Router, token: &str, exam_id: &str) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{exam_id}/session"),
            Some(token),
            None,
        ))
        .await
        .expect("start session");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    body
}

/// The exam as the admin sees it, correct flags included.
async fn admin_exam_view(app: Router, token: &str, exam_id: &str) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/exams/{exam_id}"),
            Some(token),
            None,
        ))
        .await
        .expect("get exam");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    body
}

fn correct_option_id(question: &serde_json::Value) -> String {
    question["options"]
        .as_array()
        .expect("options")
        .iter()
        .find(|option| option["is_correct"] == true)
        .expect("correct option")["id"]
        .as_str()
        .expect("option id")
        .to_string()
}

/// Selects the correct option for every objective question.
fn objective_answers(exam: &serde_json::Value) -> Vec<serde_json::Value> {
    exam["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .filter(|question| question["question_type"] != "open_ended")
        .map(|question| {
            json!({
                "question_id": question["id"],
                "selected_option_id": correct_option_id(question),
            })
        })
        .collect()
}

#[tokio::test]
async fn create_exam_validates_question_structure() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let now = OffsetDateTime::now_utc();
    let payload = json!({
        "title": "Broken exam",
        "duration_minutes": 30,
        "start_date": rfc3339(now - Duration::hours(1)),
        "end_date": rfc3339(now + Duration::hours(1)),
        "questions": [
            {
                "question_text": "Lonely option",
                "question_type": "multiple_choice",
                "points": 2,
                "options": [ { "option_text": "only", "is_correct": true } ]
            }
        ]
    });

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::POST, "/api/v1/exams", Some(&token), Some(payload)))
        .await
        .expect("create exam");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert!(body["detail"].as_str().unwrap_or("").contains("at least two options"));
}

#[tokio::test]
async fn students_never_see_correct_flags() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id");

    let admin_view = admin_exam_view(ctx.app.clone(), &admin_token, exam_id).await;
    assert!(admin_view["questions"][0]["options"][0]["is_correct"].is_boolean());

    let session = start_session(ctx.app.clone(), &student_token, exam_id).await;
    for question in session["questions"].as_array().expect("questions") {
        for option in question["options"].as_array().expect("options") {
            assert!(
                option.get("is_correct").is_none(),
                "student view leaked correctness: {option}"
            );
        }
    }
    assert_eq!(session["remaining_seconds"].as_i64().expect("remaining"), 3600);
}

#[tokio::test]
async fn full_flow_auto_scores_then_manual_grade_completes() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();

    // All objective questions answered correctly; the open-ended one is
    // left blank.
    let admin_view = admin_exam_view(ctx.app.clone(), &admin_token, &exam_id).await;
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{submission_id}/answers"),
            Some(&student_token),
            Some(json!({ "answers": objective_answers(&admin_view) })),
        ))
        .await
        .expect("save answers");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["saved_answers"], 3);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{submission_id}/submit"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("submit");
    let status = response.status();
    let result = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {result}");
    assert_eq!(result["total_score"], 10);
    assert_eq!(result["max_score"], 20);
    assert_eq!(result["is_graded"], false);

    // The attempt shows up in the ungraded queue.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/grading/submissions?filter=ungraded",
            Some(&admin_token),
            None,
        ))
        .await
        .expect("list ungraded");
    let listings = test_support::read_json(response).await;
    assert_eq!(listings.as_array().expect("listings").len(), 1);
    assert_eq!(listings[0]["student_name"], "Student");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/grading/submissions/{submission_id}"),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("detail");
    let detail = test_support::read_json(response).await;
    assert_eq!(detail["progress"], "partially_graded");
    let answers = detail["answers"].as_array().expect("answers");
    assert_eq!(answers.len(), 4, "placeholder row materialized for the blank question");

    let open_answer = answers
        .iter()
        .find(|answer| answer["question_type"] == "open_ended")
        .expect("open-ended answer");
    assert!(open_answer["points_earned"].is_null());

    // Manual grade plus recompute completes the grading dimension.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/grading/answers/{}", open_answer["id"].as_str().unwrap()),
            Some(&admin_token),
            Some(json!({ "points_earned": 7, "feedback": "Solid, but missed move semantics." })),
        ))
        .await
        .expect("grade answer");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/grading/submissions/{submission_id}/recompute"),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("recompute");
    let summary = test_support::read_json(response).await;
    assert_eq!(summary["total_score"], 17);
    assert_eq!(summary["max_score"], 20);
    assert_eq!(summary["percentage"], 85.0);
    assert_eq!(summary["is_graded"], true);

    // A rescore keeps the manual grade.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/grading/submissions/{submission_id}/rescore"),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("rescore");
    let summary = test_support::read_json(response).await;
    assert_eq!(summary["total_score"], 17);
    assert_eq!(summary["is_graded"], true);

    // And the student sees the final grade.
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/grades",
            Some(&student_token),
            None,
        ))
        .await
        .expect("grades");
    let grades = test_support::read_json(response).await;
    assert_eq!(grades[0]["total_score"], 17);
    assert_eq!(grades[0]["is_graded"], true);
    assert_eq!(grades[0]["review_available"], true);
}

#[tokio::test]
async fn duplicate_attempt_and_double_submit_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{submission_id}/submit"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    let submitted_at: Option<time::PrimitiveDateTime> =
        sqlx::query_scalar("SELECT submitted_at FROM submissions WHERE id = $1")
            .bind(&submission_id)
            .fetch_one(ctx.state.db())
            .await
            .expect("submitted_at");
    let first_submitted_at = submitted_at.expect("finalized timestamp");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{submission_id}/submit"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("second submit");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    // Exactly one submitted_at value survives the second call.
    let submitted_at: Option<time::PrimitiveDateTime> =
        sqlx::query_scalar("SELECT submitted_at FROM submissions WHERE id = $1")
            .bind(&submission_id)
            .fetch_one(ctx.state.db())
            .await
            .expect("submitted_at");
    assert_eq!(submitted_at, Some(first_submitted_at));

    // Starting again for the same (student, exam) pair is rejected and no
    // second submitted row appears.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{exam_id}/session"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("restart session");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    let submitted_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE exam_id = $1 AND student_id = $2 AND is_submitted",
    )
    .bind(&exam_id)
    .bind(&student.id)
    .fetch_one(ctx.state.db())
    .await
    .expect("count");
    assert_eq!(submitted_rows, 1);
}

#[tokio::test]
async fn saved_answers_survive_a_resume() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();
    let open_question_id = session["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .find(|question| question["question_type"] == "open_ended")
        .expect("open question")["id"]
        .as_str()
        .expect("question id")
        .to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{submission_id}/answers"),
            Some(&student_token),
            Some(json!({
                "answers": [
                    { "question_id": open_question_id, "answer_text": "Ownership moves values." }
                ]
            })),
        ))
        .await
        .expect("save answer");
    assert_eq!(response.status(), StatusCode::OK);

    // Backdate the clock a little so the resume also proves the running
    // clock is derived from started_at instead of resetting.
    sqlx::query("UPDATE submissions SET started_at = started_at - interval '10 minutes' WHERE id = $1")
        .bind(&submission_id)
        .execute(ctx.state.db())
        .await
        .expect("backdate");

    let resumed = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    assert_eq!(resumed["submission_id"], submission_id.as_str());

    let saved = resumed["saved_answers"].as_array().expect("saved answers");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["answer_text"], "Ownership moves values.");

    let remaining = resumed["remaining_seconds"].as_i64().expect("remaining");
    assert!(remaining <= 50 * 60, "clock must keep running across a resume: {remaining}");
    assert!(remaining > 49 * 60 - 30, "clock drifted too far: {remaining}");
}

#[tokio::test]
async fn save_answers_checks_owner_and_submitted_state() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let intruder =
        test_support::insert_student(ctx.state.db(), "other@test.io", "Other", "other-pass").await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let intruder_token = test_support::bearer_token(&intruder.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();
    let question_id = session["questions"][3]["id"].as_str().expect("question id").to_string();

    let payload = json!({
        "answers": [ { "question_id": question_id, "answer_text": "mine" } ]
    });

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{submission_id}/answers"),
            Some(&intruder_token),
            Some(payload.clone()),
        ))
        .await
        .expect("foreign save");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{submission_id}/submit"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    // After finalization the answers belong to the graders.
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{submission_id}/answers"),
            Some(&student_token),
            Some(payload),
        ))
        .await
        .expect("late save");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn grade_bounds_are_rejected_not_clamped() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{submission_id}/submit"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/grading/submissions/{submission_id}"),
            Some(&admin_token),
            None,
        ))
        .await
        .expect("detail");
    let detail = test_support::read_json(response).await;
    let open_answer = detail["answers"]
        .as_array()
        .expect("answers")
        .iter()
        .find(|answer| answer["question_type"] == "open_ended")
        .expect("open answer")
        .clone();
    let answer_id = open_answer["id"].as_str().expect("answer id").to_string();

    // question.points + 1 is rejected with a validation error.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/grading/answers/{answer_id}"),
            Some(&admin_token),
            Some(json!({ "points_earned": 11 })),
        ))
        .await
        .expect("over max");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert!(body["detail"].as_str().unwrap_or("").contains("between 0 and 10"));

    // Zero is a valid grade.
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/grading/answers/{answer_id}"),
            Some(&admin_token),
            Some(json!({ "points_earned": 0 })),
        ))
        .await
        .expect("zero grade");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn availability_window_gates_entry() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let now = OffsetDateTime::now_utc();

    let mut upcoming = exam_payload(60);
    upcoming["start_date"] = json!(rfc3339(now + Duration::hours(1)));
    upcoming["end_date"] = json!(rfc3339(now + Duration::hours(3)));
    let exam = create_exam(ctx.app.clone(), &admin_token, upcoming).await;
    let exam_id = exam["id"].as_str().expect("exam id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{exam_id}/session"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("early entry");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert!(body["detail"].as_str().unwrap_or("").contains("not yet available"));

    let mut ended = exam_payload(60);
    ended["start_date"] = json!(rfc3339(now - Duration::hours(3)));
    ended["end_date"] = json!(rfc3339(now - Duration::hours(1)));
    let exam = create_exam(ctx.app.clone(), &admin_token, ended).await;
    let exam_id = exam["id"].as_str().expect("exam id");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{exam_id}/session"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("late entry");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert!(body["detail"].as_str().unwrap_or("").contains("expired"));
}

#[tokio::test]
async fn assignment_list_controls_visibility() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let mut payload = exam_payload(60);
    payload["visible_to_all"] = json!(false);
    let exam = create_exam(ctx.app.clone(), &admin_token, payload).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/available",
            Some(&student_token),
            None,
        ))
        .await
        .expect("available");
    let available = test_support::read_json(response).await;
    assert_eq!(available.as_array().expect("list").len(), 0);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{exam_id}/session"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("blocked entry");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/exams/{exam_id}/assignments"),
            Some(&admin_token),
            Some(json!({ "student_ids": [student.id] })),
        ))
        .await
        .expect("assign");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/available",
            Some(&student_token),
            None,
        ))
        .await
        .expect("available after assign");
    let available = test_support::read_json(response).await;
    assert_eq!(available.as_array().expect("list").len(), 1);
    assert_eq!(available[0]["attempt_state"], "not_started");

    start_session(ctx.app.clone(), &student_token, &exam_id).await;
}

#[tokio::test]
async fn grading_endpoints_require_admin() {
    let ctx = test_support::setup_test_context().await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/grading/submissions",
            Some(&student_token),
            None,
        ))
        .await
        .expect("grading list");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&student_token),
            Some(exam_payload(60)),
        ))
        .await
        .expect("exam create");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reaper_finalizes_overdue_attempts() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let session = start_session(ctx.app.clone(), &student_token, &exam_id).await;
    let submission_id = session["submission_id"].as_str().expect("submission id").to_string();

    // Save one correct objective answer before the attempt goes stale.
    let admin_view = admin_exam_view(ctx.app.clone(), &admin_token, &exam_id).await;
    let first = &admin_view["questions"][0];
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{submission_id}/answers"),
            Some(&student_token),
            Some(json!({
                "answers": [
                    { "question_id": first["id"], "selected_option_id": correct_option_id(first) }
                ]
            })),
        ))
        .await
        .expect("save answer");
    assert_eq!(response.status(), StatusCode::OK);

    sqlx::query("UPDATE submissions SET started_at = started_at - interval '2 hours' WHERE id = $1")
        .bind(&submission_id)
        .execute(ctx.state.db())
        .await
        .expect("backdate");

    crate::tasks::maintenance::finalize_overdue_submissions(&ctx.state)
        .await
        .expect("reaper run");

    let submission = crate::repositories::submissions::find_by_id(ctx.state.db(), &submission_id)
        .await
        .expect("fetch")
        .expect("submission");
    assert!(submission.is_submitted);
    assert_eq!(submission.total_score, 2);
    assert_eq!(submission.max_score, 20);
    assert!(!submission.is_graded, "open-ended placeholder stays pending");
    assert_eq!(submission.time_taken_minutes, Some(60));

    // A second pass is a no-op.
    crate::tasks::maintenance::finalize_overdue_submissions(&ctx.state)
        .await
        .expect("second reaper run");
    let after = crate::repositories::submissions::find_by_id(ctx.state.db(), &submission_id)
        .await
        .expect("fetch")
        .expect("submission");
    assert_eq!(after.submitted_at, submission.submitted_at);
}

#[tokio::test]
async fn session_timers_flush_the_buffer_and_cancel_cleanly() {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use tokio::sync::Mutex;

    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let exam = create_exam(ctx.app.clone(), &admin_token, exam_payload(60)).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let mut controller =
        SessionController::start_or_resume(ctx.state.db(), &exam_id, &student.id)
            .await
            .expect("controller");
    let submission_id = controller.submission_id().to_string();

    let admin_view = admin_exam_view(ctx.app.clone(), &admin_token, &exam_id).await;
    let first = &admin_view["questions"][0];
    controller
        .record_answer(
            first["id"].as_str().expect("question id"),
            AnswerValue::Selected(correct_option_id(first)),
        )
        .expect("record answer");

    let controller = Arc::new(Mutex::new(controller));
    let timers = SessionTimers::spawn(controller.clone(), StdDuration::from_millis(100));

    // The autosave cadence flushes the buffered answer without any explicit
    // flush call.
    tokio::time::sleep(StdDuration::from_millis(500)).await;
    let answers =
        crate::repositories::answers::list_by_submission(ctx.state.db(), &submission_id)
            .await
            .expect("answers");
    assert_eq!(answers.len(), 1);

    timers.stop().await;

    let guard = controller.lock().await;
    assert!(!guard.is_finalized(), "countdown must not fire with a full hour left");
    assert!(guard.remaining_seconds() > 3500);
}

#[tokio::test]
async fn countdown_reaching_zero_finalizes_exactly_once() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(ctx.state.db(), "admin@test.io", "Admin", "admin-pass")
        .await;
    let student =
        test_support::insert_student(ctx.state.db(), "student@test.io", "Student", "student-pass")
            .await;
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let mut payload = exam_payload(1);
    payload["duration_minutes"] = json!(1);
    let exam = create_exam(ctx.app.clone(), &admin_token, payload).await;
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    let mut controller =
        SessionController::start_or_resume(ctx.state.db(), &exam_id, &student.id)
            .await
            .expect("controller");
    assert_eq!(controller.remaining_seconds(), 60);

    let admin_view = admin_exam_view(ctx.app.clone(), &admin_token, &exam_id).await;
    let first = &admin_view["questions"][0];
    controller
        .record_answer(
            first["id"].as_str().expect("question id"),
            AnswerValue::Selected(correct_option_id(first)),
        )
        .expect("record answer");
    controller.autosave_tick().await;

    let mut finalized = 0;
    for _ in 0..70 {
        if controller.tick().await.expect("tick").is_some() {
            finalized += 1;
        }
    }
    assert_eq!(finalized, 1, "exactly one auto-submit");
    assert!(controller.is_finalized());
    assert_eq!(controller.remaining_seconds(), 0);

    // Ticks after finalization are no-ops and late answers are refused.
    assert!(controller.tick().await.expect("tick").is_none());
    let err = controller
        .record_answer(
            first["id"].as_str().expect("question id"),
            AnswerValue::Selected(correct_option_id(first)),
        )
        .unwrap_err();
    assert!(matches!(err, crate::services::ExamFlowError::AlreadySubmitted));

    let submission = crate::repositories::submissions::find_by_exam_and_student(
        ctx.state.db(),
        &exam_id,
        &student.id,
    )
    .await
    .expect("fetch")
    .expect("submission");
    assert!(submission.is_submitted);
    assert_eq!(submission.total_score, 2, "flushed answer was scored");

    // The manual submit path now observes AlreadySubmitted.
    let err = crate::services::session::finalize_submission(
        ctx.state.db(),
        &submission.id,
        Some(&student.id),
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, crate::services::ExamFlowError::AlreadySubmitted));
}
