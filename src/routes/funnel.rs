use axum::extract::{Query, State};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BATCH_HISTORY_LIMIT, MAX_BATCH_HISTORY_LIMIT};
use crate::extractors::JsonBody;
use crate::funnel::types::{AnswerEvent, BatchRequest, GuideConcept};
use crate::funnel::variant::VariantArm;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(select_batch))
        .route("/answers", post(record_answers))
        .route("/state", get(mastery_state))
        .route("/batches", get(batch_history))
        .route("/variant", get(effective_variant))
        .route(
            "/variant-override",
            put(set_variant_override).delete(clear_variant_override),
        )
        .route("/seen/count", get(seen_count))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectBatchBody {
    user_id: String,
    guide_id: String,
    #[serde(default)]
    guide_concepts: Vec<GuideConcept>,
    count: u32,
    #[serde(default)]
    seed: Option<u64>,
}

async fn select_batch(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SelectBatchBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if body.user_id.trim().is_empty() || body.guide_id.trim().is_empty() {
        return Err(AppError::bad_request(
            "INVALID_IDENTITY",
            "userId and guideId are required",
        ));
    }
    if body.count == 0 {
        return Err(AppError::bad_request(
            "INVALID_COUNT",
            "count must be a positive integer",
        ));
    }

    let selection = state
        .funnel()
        .select_batch(BatchRequest {
            user_id: body.user_id,
            guide_id: body.guide_id,
            guide_concepts: body.guide_concepts,
            requested: body.count,
            seed: body.seed,
        })
        .await?;
    Ok(ok(selection))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordAnswersBody {
    user_id: String,
    guide_id: String,
    answers: Vec<AnswerEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordAnswersReply {
    recorded: usize,
    tracked_concepts: usize,
}

async fn record_answers(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RecordAnswersBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if body.answers.is_empty() {
        return Err(AppError::bad_request(
            "EMPTY_ANSWERS",
            "answers must not be empty",
        ));
    }

    let updated = state
        .funnel()
        .record_answers(&body.user_id, &body.guide_id, &body.answers)
        .await?;
    Ok(ok(RecordAnswersReply {
        recorded: body.answers.len(),
        tracked_concepts: updated.concepts.len(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityQuery {
    user_id: String,
    guide_id: String,
}

async fn mastery_state(
    Query(query): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let snapshot = state
        .funnel()
        .mastery_snapshot(&query.user_id, &query.guide_id)
        .await?;
    Ok(ok(snapshot))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchHistoryQuery {
    user_id: String,
    limit: Option<usize>,
}

async fn batch_history(
    Query(query): Query<BatchHistoryQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_BATCH_HISTORY_LIMIT)
        .clamp(1, MAX_BATCH_HISTORY_LIMIT);
    let history = state.store().list_batch_metas(&query.user_id, limit)?;
    Ok(ok(history))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VariantReply {
    arm: VariantArm,
    source: &'static str,
}

async fn effective_variant(
    Query(query): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let (arm, from_override) = state
        .funnel()
        .effective_variant(&query.user_id, &query.guide_id)
        .await?;
    Ok(ok(VariantReply {
        arm,
        source: if from_override { "override" } else { "assigned" },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantOverrideBody {
    guide_id: String,
    arm: VariantArm,
}

async fn set_variant_override(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<VariantOverrideBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    state.store().set_variant_override(&body.guide_id, body.arm)?;
    Ok(ok(serde_json::json!({ "guideId": body.guide_id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearOverrideQuery {
    guide_id: String,
}

async fn clear_variant_override(
    Query(query): Query<ClearOverrideQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let removed = state.store().clear_variant_override(&query.guide_id)?;
    Ok(ok(serde_json::json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeenCountQuery {
    user_id: String,
    module_id: String,
}

async fn seen_count(
    Query(query): Query<SeenCountQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let count = state
        .funnel()
        .seen_count(&query.user_id, &query.module_id)
        .await;
    Ok(ok(serde_json::json!({ "count": count })))
}
