mod common;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};

use common::app::{spawn_test_server, spawn_test_server_without_generation};
use common::fixtures::{guide_concepts_json, seed_questions};
use common::http::{assert_json_error, assert_status_ok_json, request, response_json};
use practice_backend::funnel::types::SourceTier;

fn batch_body(user: &str, guide: &str, labels: &[&str], count: u32) -> serde_json::Value {
    serde_json::json!({
        "userId": user,
        "guideId": guide,
        "guideConcepts": guide_concepts_json(labels),
        "count": count,
        "seed": 7,
    })
}

#[tokio::test]
async fn it_first_session_batch_is_all_explore() {
    let app = spawn_test_server().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &["anemia", "iron", "ferritin", "tibc", "hepcidin"], 5)),
    )
    .await;

    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);

    let data = &body["data"];
    assert_eq!(data["questions"].as_array().unwrap().len(), 5);
    assert!(data["meta"]["focusTargets"].as_array().unwrap().is_empty());
    assert_eq!(data["meta"]["exploreTargets"].as_array().unwrap().len(), 5);
    assert_eq!(data["meta"]["sourceCounts"]["generated"], 5);
    assert!(data["warnings"].as_array().unwrap().is_empty());

    // every question is attributed to a target concept
    for question in data["questions"].as_array().unwrap() {
        let id = question["id"].as_str().unwrap();
        assert!(data["meta"]["targetByQuestionId"].get(id).is_some());
    }
}

#[tokio::test]
async fn it_batches_never_repeat_questions_across_sessions() {
    let app = spawn_test_server_without_generation().await;
    seed_questions(app.state.store(), "g1", "osmosis", SourceTier::Bank, 4);

    let mut served: HashSet<String> = HashSet::new();
    for _ in 0..2 {
        let resp = request(
            &app.app,
            Method::POST,
            "/api/funnel/batch",
            Some(batch_body("u1", "g1", &["osmosis"], 2)),
        )
        .await;
        let (status, _, body) = response_json(resp).await;
        assert_eq!(status, StatusCode::OK);

        for question in body["data"]["questions"].as_array().unwrap() {
            let id = question["id"].as_str().unwrap().to_string();
            assert!(served.insert(id), "same question delivered twice");
        }
    }
    assert_eq!(served.len(), 4);
}

#[tokio::test]
async fn it_exhausted_pools_yield_short_batch_with_warning() {
    let app = spawn_test_server_without_generation().await;
    seed_questions(app.state.store(), "g1", "osmosis", SourceTier::Bank, 1);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &["osmosis"], 4)),
    )
    .await;

    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK, "shortfall is not an error");
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 1);
    assert!(!body["data"]["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn it_verified_tier_wins_under_verified_first_override() {
    let app = spawn_test_server_without_generation().await;
    seed_questions(app.state.store(), "g1", "osmosis", SourceTier::Verified, 2);
    seed_questions(app.state.store(), "g1", "osmosis", SourceTier::Bank, 2);

    let put = request(
        &app.app,
        Method::PUT,
        "/api/funnel/variant-override",
        Some(serde_json::json!({ "guideId": "g1", "arm": "verifiedFirst" })),
    )
    .await;
    assert_eq!(put.status(), StatusCode::OK);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &["osmosis"], 2)),
    )
    .await;

    let (_, _, body) = response_json(resp).await;
    assert_eq!(body["data"]["meta"]["sourceCounts"]["verified"], 2);
    assert_eq!(body["data"]["meta"]["sourceCounts"]["bank"], 0);
}

#[tokio::test]
async fn it_answers_feed_the_mastery_snapshot() {
    let app = spawn_test_server().await;

    let answers: Vec<serde_json::Value> = (0..6)
        .map(|i| {
            serde_json::json!({
                "questionId": format!("q{i}"),
                "conceptTags": if i % 2 == 0 { ["weak concept"] } else { ["strong concept"] },
                "isCorrect": i % 2 != 0,
            })
        })
        .collect();

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/answers",
        Some(serde_json::json!({
            "userId": "u1",
            "guideId": "g1",
            "answers": answers,
        })),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["recorded"], 6);
    assert_eq!(body["data"]["trackedConcepts"], 2);

    let resp = request(
        &app.app,
        Method::GET,
        "/api/funnel/state?userId=u1&guideId=g1",
        None,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = body["data"].as_array().unwrap();
    assert_eq!(snapshot.len(), 2);
    // most urgent first: the all-wrong concept leads
    assert_eq!(snapshot[0]["key"], "weak concept");
    assert!(snapshot[0]["expectedMastery"].as_f64().unwrap() < 0.5);
    assert!(
        snapshot[0]["priority"].as_f64().unwrap()
            > snapshot[1]["priority"].as_f64().unwrap()
    );
}

#[tokio::test]
async fn it_variant_assignment_is_stable_and_overridable() {
    let app = spawn_test_server().await;

    let (_, _, first) = response_json(
        request(&app.app, Method::GET, "/api/funnel/variant?userId=u1&guideId=g1", None).await,
    )
    .await;
    let (_, _, second) = response_json(
        request(&app.app, Method::GET, "/api/funnel/variant?userId=u1&guideId=g1", None).await,
    )
    .await;
    assert_eq!(first["data"]["arm"], second["data"]["arm"]);
    assert_eq!(first["data"]["source"], "assigned");

    let put = request(
        &app.app,
        Method::PUT,
        "/api/funnel/variant-override",
        Some(serde_json::json!({ "guideId": "g1", "arm": "split" })),
    )
    .await;
    assert_eq!(put.status(), StatusCode::OK);

    let (_, _, overridden) = response_json(
        request(&app.app, Method::GET, "/api/funnel/variant?userId=u1&guideId=g1", None).await,
    )
    .await;
    assert_eq!(overridden["data"]["arm"], "split");
    assert_eq!(overridden["data"]["source"], "override");

    let del = request(
        &app.app,
        Method::DELETE,
        "/api/funnel/variant-override?guideId=g1",
        None,
    )
    .await;
    assert_eq!(del.status(), StatusCode::OK);

    let (_, _, restored) = response_json(
        request(&app.app, Method::GET, "/api/funnel/variant?userId=u1&guideId=g1", None).await,
    )
    .await;
    assert_eq!(restored["data"]["arm"], first["data"]["arm"]);
    assert_eq!(restored["data"]["source"], "assigned");
}

#[tokio::test]
async fn it_seen_count_grows_with_deliveries() {
    let app = spawn_test_server().await;

    let (_, _, before) = response_json(
        request(&app.app, Method::GET, "/api/funnel/seen/count?userId=u1&moduleId=g1", None).await,
    )
    .await;
    assert_eq!(before["data"]["count"], 0);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &["anemia", "iron"], 2)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, _, after) = response_json(
        request(&app.app, Method::GET, "/api/funnel/seen/count?userId=u1&moduleId=g1", None).await,
    )
    .await;
    assert!(after["data"]["count"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn it_batch_history_lists_newest_first() {
    let app = spawn_test_server().await;

    for labels in [["first concept"], ["second concept"]] {
        let resp = request(
            &app.app,
            Method::POST,
            "/api/funnel/batch",
            Some(batch_body("u1", "g1", &labels, 1)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let (status, _, body) = response_json(
        request(&app.app, Method::GET, "/api/funnel/batches?userId=u1&limit=5", None).await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn it_rejects_invalid_batch_requests() {
    let app = spawn_test_server().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("", "g1", &["anemia"], 5)),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_IDENTITY");

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &["anemia"], 0)),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_COUNT");
}

#[tokio::test]
async fn it_empty_universe_returns_empty_batch() {
    let app = spawn_test_server().await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/funnel/batch",
        Some(batch_body("u1", "g1", &[], 5)),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["questions"].as_array().unwrap().is_empty());
    assert!(!body["data"]["warnings"].as_array().unwrap().is_empty());
}
