mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use phrasebot::constants::{MAX_IMPORT_PHRASES, STUDY_INTERVALS};

use common::app::spawn_test_server;
use common::auth::learner_auth;
use common::fixtures::seed_phrases;
use common::http::{assert_json_error, assert_status_ok_json, call};

fn due_seed_time() -> i64 {
    // 已经过了第一档间隔，种下的短语全部到期
    chrono::Utc::now().timestamp() - STUDY_INTERVALS[0] - 10
}

#[tokio::test]
async fn it_study_idle_without_phrases() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);

    let (status, body) = call(&app.app, Method::GET, "/api/study", None, &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["state"], "idle");
    assert!(body["data"]["nextStudy"].is_null());

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": 1 })),
        &[auth],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn it_study_and_score_flow() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);
    let phrases = seed_phrases(app.store(), 1, 2, due_seed_time());

    let (status, body) = call(&app.app, Method::GET, "/api/study", None, &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["state"], "due");
    assert_eq!(body["data"]["dueCount"], 2);
    assert_eq!(body["data"]["phrase"]["sequence"], phrases[0].sequence);

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": 1, "messageId": "m-1" })),
        &[auth.clone()],
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phrase"]["score"], 1);
    assert_eq!(body["data"]["previousScore"], 0);
    assert!(app.store().last_activity(1).unwrap().is_some());

    // 相同 messageId 的重投被拒绝
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": 2, "messageId": "m-1" })),
        &[auth.clone()],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "DUPLICATE_MESSAGE");

    // 5 秒内对同一短语的重复作答
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": 1, "sequence": phrases[0].sequence })),
        &[auth.clone()],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "DUPLICATE_SUBMISSION");

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": -1, "sequence": phrases[0].sequence })),
        &[auth.clone()],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "STUDY_CHANGED");

    // 同样的 +1 作用在另一张卡片上不算重复
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/score",
        Some(json!({ "delta": 1 })),
        &[auth],
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phrase"]["sequence"], phrases[1].sequence);
    assert_eq!(app.store().score_total(1).unwrap(), 2);
}

#[tokio::test]
async fn it_failed_score_keeps_message_id_for_retry() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);
    let payload = json!({ "delta": 1, "messageId": "retry-1" });

    let (status, _) = call(&app.app, Method::POST, "/api/study/score", Some(payload.clone()), &[auth.clone()]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    seed_phrases(app.store(), 1, 1, due_seed_time());
    let (status, body) = call(&app.app, Method::POST, "/api/study/score", Some(payload), &[auth]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phrase"]["score"], 1);
}

#[tokio::test]
async fn it_stats_throttled_but_peekable() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);
    seed_phrases(app.store(), 1, 3, due_seed_time());

    let (status, body) = call(&app.app, Method::GET, "/api/stats", None, &[auth.clone()]).await;
    assert_eq!(status.as_u16(), 425);
    assert_json_error(&body, "NOT_READY");
    assert!(body["readyAt"].is_i64());

    let (status, body) = call(&app.app, Method::GET, "/api/stats?peek=true", None, &[auth]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phraseCount"], 3);
    assert_eq!(body["data"]["rank"], 1);
}

#[tokio::test]
async fn it_import_queue_apply_and_clear() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);
    let batch = json!({ "phrases": [
        { "text": "uno", "explanation": "one" },
        { "text": "dos", "explanation": "two" },
    ]});

    let (status, body) = call(&app.app, Method::POST, "/api/import", Some(batch.clone()), &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["pending"], 2);

    let (status, body) = call(&app.app, Method::GET, "/api/import", None, &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phrases"].as_array().expect("pending").len(), 2);

    let (status, body) = call(&app.app, Method::POST, "/api/import/apply", None, &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(app.store().phrase_count(1).unwrap(), 2);
    assert_eq!(app.store().import_count(1).unwrap(), 1);

    let (status, _) = call(&app.app, Method::POST, "/api/import", Some(batch), &[auth.clone()]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app.app, Method::DELETE, "/api/import", None, &[auth.clone()]).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["cleared"], true);

    let (status, body) = call(&app.app, Method::GET, "/api/import", None, &[auth]).await;
    assert_status_ok_json(status, &body);
    assert!(body["data"]["phrases"].as_array().expect("pending").is_empty());
}

#[tokio::test]
async fn it_import_rejects_bad_batches() {
    let app = spawn_test_server().await;
    let auth = learner_auth(app.store(), 1);

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/import",
        Some(json!({ "phrases": [] })),
        &[auth.clone()],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "IMPORT_INVALID");

    let too_many: Vec<_> = (0..=MAX_IMPORT_PHRASES)
        .map(|i| json!({ "text": format!("w{i}"), "explanation": "x" }))
        .collect();
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/import",
        Some(json!({ "phrases": too_many })),
        &[auth],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_json_error(&body, "PAYLOAD_TOO_LARGE");
}
