//! HTTP surface for engine-driven delegate invocations.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::workflow::{ActivityContext, Variables};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateInvocation {
    pub process_instance_id: Option<String>,
    pub activity_id: Option<String>,
    pub activity_name: Option<String>,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Serialize)]
pub struct DelegateResponse {
    pub variables: Variables,
}

/// `POST /delegates/:action`
///
/// Returns the merged variable map. Business faults come back as 422 with
/// `errorCode` so the engine can route them.
pub async fn invoke(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(invocation): Json<DelegateInvocation>,
) -> Result<Json<DelegateResponse>, AppError> {
    let process_instance_id = invocation
        .process_instance_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let activity_id = invocation.activity_id.unwrap_or_else(|| action.clone());
    let activity_name = invocation.activity_name.unwrap_or_else(|| action.clone());

    tracing::info!(
        action = %action,
        process_instance_id = %process_instance_id,
        activity_id = %activity_id,
        "Delegate invoked"
    );

    let ctx = ActivityContext::start(process_instance_id, activity_id, activity_name);
    let mut variables = invocation.variables;
    match state.delegate.execute(ctx, &action, &mut variables).await {
        Ok(()) => Ok(Json(DelegateResponse { variables })),
        Err(e) => Err(AppError::from_delegate(e, variables)),
    }
}
