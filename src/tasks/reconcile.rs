use crate::app_state::TaskContext;
use crate::models::model::ModelUpdate;
use crate::models::result::{
    DelayedResult, EnrolmentDelayedResult, NotificationTask, StatusCode,
};
use crate::services::api::ApiError;

/// Write back the side outputs of one provider call: deferred results by
/// kind, then notifications. Runs after every delegation, whatever branch
/// the primary result took.
pub(crate) async fn reconcile(
    ctx: &TaskContext,
    delayed_results: Vec<DelayedResult>,
    notifications: Vec<NotificationTask>,
) -> Result<(), ApiError> {
    for delayed in delayed_results {
        send_delayed_result(ctx, delayed).await?;
    }
    for notification in notifications {
        ctx.storage
            .upsert_notification(ctx.provider_id, &notification)
            .await?;
    }
    Ok(())
}

async fn send_delayed_result(ctx: &TaskContext, delayed: DelayedResult) -> Result<(), ApiError> {
    let pid = ctx.provider_id;
    match delayed {
        DelayedResult::Validation(d) => match &d.result {
            Some(result) => {
                ctx.storage
                    .set_sample_validation(pid, &d.learner_id, d.sample_id, d.validation_id, result)
                    .await
            }
            None => {
                ctx.storage
                    .set_sample_validation_status(
                        pid,
                        &d.learner_id,
                        d.sample_id,
                        d.validation_id,
                        StatusCode::WaitingExternalService,
                    )
                    .await
            }
        },
        DelayedResult::Enrolment(d) => send_enrolment(ctx, &d).await,
        DelayedResult::Verification(d) => match &d.result {
            Some(result) => {
                ctx.storage
                    .set_request_result(pid, d.result_id, result)
                    .await
            }
            None => {
                ctx.storage
                    .set_request_status(pid, d.result_id, StatusCode::WaitingExternalService)
                    .await
            }
        },
    }
}

/// Finish a deferred enrolment under the lock it was handed, identified by
/// the task id of the job that took it.
async fn send_enrolment(ctx: &TaskContext, d: &EnrolmentDelayedResult) -> Result<(), ApiError> {
    let pid = ctx.provider_id;
    match &d.result {
        Some(result) if result.valid => {
            ctx.storage
                .save_model(pid, &d.learner_id, &d.task_id, &ModelUpdate::from(result))
                .await
        }
        Some(result) => {
            tracing::warn!(
                learner_id = %d.learner_id,
                error = ?result.error_message,
                "Deferred enrolment failed, releasing model"
            );
            ctx.storage.unlock_model(pid, &d.learner_id, &d.task_id).await
        }
        None => {
            for sample_id in &d.sample_ids {
                ctx.storage
                    .set_sample_status(
                        pid,
                        &d.learner_id,
                        *sample_id,
                        StatusCode::WaitingExternalService,
                    )
                    .await?;
            }
            Ok(())
        }
    }
}
