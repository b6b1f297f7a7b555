use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::domain::TransferRecord;
use crate::error::AppError;

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransferRecord>, AppError> {
    state
        .service
        .get_transaction(&transaction_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", transaction_id)))
}
