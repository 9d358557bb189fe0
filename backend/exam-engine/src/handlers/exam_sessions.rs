use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::EngineError,
    models::{
        integrity::VisibilityChangeRequest, CreateExamSessionRequest, CreateExamSessionResponse,
        QuestionIndexRequest, SelectOptionRequest, SessionActionResponse,
    },
    services::{exam_session::ExamSession, AppState},
};

pub(crate) fn error_response(e: EngineError) -> (StatusCode, String) {
    let status = match &e {
        EngineError::QuizNotFound(_) | EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidQuiz(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::QuizUnavailable { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

fn find_session(
    state: &AppState,
    session_id: &str,
) -> Result<Arc<ExamSession>, (StatusCode, String)> {
    state.session(session_id).map_err(error_response)
}

fn action_response(session: &ExamSession, applied: bool) -> Json<SessionActionResponse> {
    Json(SessionActionResponse {
        applied,
        session: session.view(),
    })
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExamSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Opening exam session for quiz_id={}", req.quiz_id);

    match state.open_session(&req.quiz_id).await {
        Ok(session) => Ok((
            StatusCode::CREATED,
            Json(CreateExamSessionResponse {
                session_id: session.id().to_string(),
                quiz: session.quiz().summary(),
                deadline: session.deadline_at(),
            }),
        )),
        Err(e) => {
            tracing::error!(error = ?e, "Failed to open exam session: {}", e);
            Err(error_response(e))
        }
    }
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    Ok((StatusCode::OK, Json(session.view())))
}

pub async fn select_option(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SelectOptionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    let applied = session.select(req.index, &req.option_id);
    tracing::debug!(
        "select: session={} index={} option={} applied={}",
        session_id,
        req.index,
        req.option_id,
        applied
    );
    Ok(action_response(&session, applied))
}

pub async fn clear_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<QuestionIndexRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    let applied = session.clear(req.index);
    Ok(action_response(&session, applied))
}

pub async fn mark_for_review(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<QuestionIndexRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    let applied = session.mark_for_review(req.index);
    Ok(action_response(&session, applied))
}

pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<QuestionIndexRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    let applied = session.navigate(req.index);
    if !applied {
        tracing::debug!(
            "navigate ignored: session={} index={}",
            session_id,
            req.index
        );
    }
    Ok(action_response(&session, applied))
}

pub async fn visibility_changed(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<VisibilityChangeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    let outcome = session.visibility_changed(req.visibility).await;
    Ok(Json(json!({
        "integrity": outcome,
        "session": session.view(),
    })))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Manual submit requested: session={}", session_id);
    let session = find_session(&state, &session_id)?;
    let outcome = session.submit().await;
    Ok(Json(json!({
        "submission": outcome,
        "session": session.view(),
    })))
}

pub async fn unload_guard(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = find_session(&state, &session_id)?;
    Ok(Json(session.unload_guard()))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Closing exam session: {}", session_id);
    state.close_session(&session_id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
