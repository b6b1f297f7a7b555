//! Adapts variable-based engine invocations onto the account service.

use bigdecimal::BigDecimal;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::action::{AccountRole, DelegateAction, DelegateRequest};
use super::events::{
    ActivityContext, ActivityStatus, EventPublisher, EVENT_TYPE_ACTIVITY, EVENT_TYPE_NOTIFICATION,
};
use super::fault::{BusinessFault, DelegateError};
use super::notification::TransferSummary;
use super::variables::{decimal_value, Variables};
use crate::services::{AccountService, TransferError};
use crate::validation;

const STATUS_COMPLETED: &str = "COMPLETED";
const STATUS_FAILED: &str = "FAILED";
const FATAL_ERROR_CODE: &str = "FATAL";

#[derive(Clone)]
pub struct TransferDelegate {
    service: AccountService,
    events: EventPublisher,
}

impl TransferDelegate {
    pub fn new(service: AccountService, events: EventPublisher) -> Self {
        Self { service, events }
    }

    pub fn service(&self) -> &AccountService {
        &self.service
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Runs one engine action against `vars`.
    ///
    /// Output variables are merged into `vars` even when a fault is returned,
    /// so the process can inspect `transferError` on the fault path.
    pub async fn execute(
        &self,
        ctx: ActivityContext,
        action: &str,
        vars: &mut Variables,
    ) -> Result<(), DelegateError> {
        let mut outputs = Variables::new();
        let outcome = match action.parse::<DelegateAction>() {
            Ok(action) => self.dispatch(&ctx, action, vars, &mut outputs).await,
            Err(fault) => Err(fault.into()),
        };

        let result = Value::Object(outputs.clone());
        vars.extend(outputs);

        let event = match &outcome {
            Ok(()) => ctx.finish(
                EVENT_TYPE_ACTIVITY,
                ActivityStatus::Completed,
                format!("{} completed", action),
                result,
                None,
            ),
            Err(e) => {
                let code = e
                    .fault_code()
                    .map(|c| c.as_str())
                    .unwrap_or(FATAL_ERROR_CODE);
                match e {
                    DelegateError::Fault(_) => {
                        warn!(action = %action, process_instance_id = %ctx.process_instance_id, error = %e, "Delegate raised business fault")
                    }
                    DelegateError::Fatal(_) => {
                        error!(action = %action, process_instance_id = %ctx.process_instance_id, error = %e, "Delegate failed")
                    }
                }
                ctx.finish(
                    EVENT_TYPE_ACTIVITY,
                    ActivityStatus::Failed,
                    e.to_string(),
                    result,
                    Some(code.to_string()),
                )
            }
        };
        self.events.publish(event);

        outcome
    }

    async fn dispatch(
        &self,
        ctx: &ActivityContext,
        action: DelegateAction,
        vars: &Variables,
        out: &mut Variables,
    ) -> Result<(), DelegateError> {
        match DelegateRequest::decode(action, vars)? {
            DelegateRequest::ValidateAccount {
                role,
                account_number,
            } => {
                self.validate_account(role, account_number, out).await;
                Ok(())
            }
            DelegateRequest::CheckBalance {
                source_account,
                amount,
            } => self.check_balance(&source_account, &amount, out).await,
            DelegateRequest::ExecuteTransfer {
                transaction_id,
                source_account,
                dest_account,
                amount,
                description,
            } => {
                self.execute_transfer(
                    transaction_id,
                    source_account,
                    dest_account,
                    amount,
                    description,
                    out,
                )
                .await
            }
            DelegateRequest::SendNotification {
                source_account,
                dest_account,
                amount,
                transaction_id,
                transfer_success,
                transfer_error,
            } => {
                let summary = TransferSummary {
                    source_account: source_account.as_deref(),
                    dest_account: dest_account.as_deref(),
                    amount: amount.as_ref(),
                    transaction_id: transaction_id.as_deref(),
                    success: transfer_success,
                    error: transfer_error.as_deref(),
                };
                self.send_notification(ctx, &summary, out);
                Ok(())
            }
        }
    }

    async fn validate_account(
        &self,
        role: AccountRole,
        account_number: Option<String>,
        out: &mut Variables,
    ) {
        let (valid, name) = match account_number {
            Some(number) => {
                let valid = self.service.validate_account(&number).await;
                let name = match self.service.get_account(&number).await {
                    Ok(account) => account.map(|a| a.account_name),
                    Err(e) => {
                        warn!(account = %number, error = %e, "Account name lookup failed");
                        None
                    }
                };
                (valid, name)
            }
            None => (false, None),
        };

        out.insert("accountValid".into(), Value::Bool(valid));
        out.insert(format!("{}Valid", role.prefix()), Value::Bool(valid));
        if let Some(name) = name {
            out.insert("accountName".into(), Value::String(name.clone()));
            out.insert(format!("{}Name", role.prefix()), Value::String(name));
        }
    }

    async fn check_balance(
        &self,
        source_account: &str,
        amount: &BigDecimal,
        out: &mut Variables,
    ) -> Result<(), DelegateError> {
        validation::validate_positive_amount(amount)
            .map_err(|e| BusinessFault::validation(e.to_string()))?;

        let current = match self.service.get_balance(source_account).await {
            Ok(balance) => balance,
            Err(TransferError::AccountNotFound(_)) => BigDecimal::from(0),
            Err(e) => return Err(DelegateError::Fatal(e.to_string())),
        };
        let sufficient = &current >= amount;

        out.insert("currentBalance".into(), decimal_value(&current));
        out.insert("balanceSufficient".into(), Value::Bool(sufficient));
        if !sufficient {
            out.insert("balanceShortfall".into(), decimal_value(&(amount - &current)));
        }
        Ok(())
    }

    async fn execute_transfer(
        &self,
        transaction_id: Option<String>,
        source_account: String,
        dest_account: String,
        amount: BigDecimal,
        description: Option<String>,
        out: &mut Variables,
    ) -> Result<(), DelegateError> {
        // Detached so a dropped caller cannot abandon a saga between debit and credit.
        let service = self.service.clone();
        let task = tokio::spawn(async move {
            match transaction_id {
                Some(id) => {
                    service
                        .execute_transfer_with_id(id, &source_account, &dest_account, &amount, description)
                        .await
                }
                None => {
                    service
                        .execute_transfer(&source_account, &dest_account, &amount, description)
                        .await
                }
            }
        });
        let outcome = task
            .await
            .map_err(|e| DelegateError::Fatal(format!("transfer task aborted: {}", e)))?;

        match outcome {
            Ok(transaction_id) => {
                info!(transaction_id = %transaction_id, "Transfer delegate completed");
                out.insert("transferSuccess".into(), Value::Bool(true));
                out.insert("transactionId".into(), Value::String(transaction_id));
                out.insert("transferStatus".into(), Value::String(STATUS_COMPLETED.into()));
                out.insert("transferTimestamp".into(), Value::String(now_rfc3339()));
                Ok(())
            }
            Err(err) => {
                out.insert("transferSuccess".into(), Value::Bool(false));
                out.insert("transferStatus".into(), Value::String(STATUS_FAILED.into()));
                out.insert("transferError".into(), Value::String(err.to_string()));
                if let Some(id) = err.transaction_id() {
                    out.insert("transactionId".into(), Value::String(id.to_string()));
                }

                Err(match err {
                    TransferError::Validation(e) => BusinessFault::validation(e.to_string()).into(),
                    e if e.is_business_failure() => BusinessFault::transfer_failed(e.to_string()).into(),
                    e => DelegateError::Fatal(e.to_string()),
                })
            }
        }
    }

    fn send_notification(&self, ctx: &ActivityContext, summary: &TransferSummary<'_>, out: &mut Variables) {
        let message = summary.message();
        info!(process_instance_id = %ctx.process_instance_id, notification = %message, "Transfer notification");

        let event = ctx.finish(
            EVENT_TYPE_NOTIFICATION,
            if summary.success {
                ActivityStatus::Completed
            } else {
                ActivityStatus::Failed
            },
            message.clone(),
            Value::Null,
            summary.error.map(str::to_string),
        );
        self.events.publish(event);

        out.insert("notificationSent".into(), Value::Bool(true));
        out.insert("notificationMessage".into(), Value::String(message));
        out.insert("notificationTimestamp".into(), Value::String(now_rfc3339()));
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
