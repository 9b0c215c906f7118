use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::extractors::JsonBody;
use crate::funnel::types::SourceTier;
use crate::response::{created, ok, paginated, AppError};
use crate::state::AppState;
use crate::store::operations::questions::BankQuestion;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/batch", post(batch_create_questions))
        .route("/count", get(count_questions))
        .route("/:id", get(get_question))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuestionBody {
    #[serde(default)]
    id: Option<String>,
    guide_id: String,
    text: String,
    options: Vec<String>,
    correct_answer: String,
    concept_tags: Vec<String>,
    source: SourceTier,
}

impl CreateQuestionBody {
    fn into_bank_question(self) -> BankQuestion {
        BankQuestion {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            guide_id: self.guide_id,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            concept_tags: self.concept_tags,
            source: self.source,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionIdReply {
    id: String,
}

async fn create_question(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateQuestionBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let question = body.into_bank_question();
    state.store().upsert_question(&question)?;
    Ok(created(QuestionIdReply { id: question.id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateBody {
    questions: Vec<CreateQuestionBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateReply {
    created: usize,
    failed: usize,
    errors: Vec<String>,
}

/// Best-effort bulk import: invalid items are reported, valid ones land.
async fn batch_create_questions(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BatchCreateBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut reply = BatchCreateReply {
        created: 0,
        failed: 0,
        errors: Vec::new(),
    };

    for item in body.questions {
        let question = item.into_bank_question();
        match state.store().upsert_question(&question) {
            Ok(()) => reply.created += 1,
            Err(error) => {
                reply.failed += 1;
                reply.errors.push(format!("{}: {}", question.id, error));
            }
        }
    }

    Ok(ok(reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuestionsQuery {
    guide_id: String,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_questions(
    Query(query): Query<ListQuestionsQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = ((page - 1) * per_page) as usize;

    let (items, total) = state
        .store()
        .list_questions(&query.guide_id, per_page as usize, offset)?;
    Ok(paginated(items, total, page, per_page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountQuery {
    guide_id: String,
}

async fn count_questions(
    Query(query): Query<CountQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let count = state.store().count_questions(&query.guide_id)?;
    Ok(ok(serde_json::json!({ "count": count })))
}

async fn get_question(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    match state.store().get_question(&id)? {
        Some(question) => Ok(ok(question)),
        None => Err(AppError::not_found("Question not found")),
    }
}
