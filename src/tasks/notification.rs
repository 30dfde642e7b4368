use async_trait::async_trait;

use super::{load_provider, reconcile::reconcile, Attempt, Task, TaskError};
use crate::app_state::TaskContext;
use crate::models::job::TaskName;
use crate::provider::ProviderOutput;

/// Hands a fired notification back to the provider. Deferred enrolments
/// release their model lock through the results produced here.
pub struct NotificationTask {
    attempt: Attempt,
    notification_id: i64,
}

impl NotificationTask {
    pub fn new(attempt: Attempt, notification_id: i64) -> Self {
        Self {
            attempt,
            notification_id,
        }
    }
}

#[async_trait]
impl Task for NotificationTask {
    fn name(&self) -> TaskName {
        TaskName::Notify
    }

    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        let (provider, _) = load_provider(ctx).await?;

        let notification = match ctx
            .storage
            .get_notification(ctx.provider_id, self.notification_id)
            .await
        {
            Ok(notification) => notification,
            Err(e) if e.is_not_found() => {
                return Err(TaskError::Reject("Notification not available.".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let ProviderOutput {
            result: (),
            notifications,
            delayed_results,
        } = provider
            .on_notification(&notification.key, notification.info)
            .await
            .map_err(TaskError::from_provider)?;

        ctx.storage
            .delete_notification(ctx.provider_id, self.notification_id)
            .await?;

        // The notification is gone at this point; a failed write-back leaves
        // these results only in the log.
        let pending = delayed_results.clone();
        if let Err(e) = reconcile(ctx, delayed_results, notifications).await {
            for delayed in &pending {
                tracing::error!(
                    notification_id = self.notification_id,
                    key = %notification.key,
                    delayed = ?delayed,
                    "Deferred result not stored"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }
}
