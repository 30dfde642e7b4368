use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Attempt, TaskError, BLOB_MAX_RETRIES, BLOB_RETRY_COUNTDOWN};
use crate::app_state::TaskContext;
use crate::models::sample::{Sample, SampleRecord, SensorData};
use crate::models::validation_data::ValidationData;
use crate::services::blobs::BlobError;

/// Download a blob. Transient failures become a bounded retry of the job.
pub(crate) async fn download(
    ctx: &TaskContext,
    attempt: &Attempt,
    url: &str,
) -> Result<Value, TaskError> {
    match ctx.blobs.fetch_json(url).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => Err(TaskError::retry(
            attempt,
            BLOB_RETRY_COUNTDOWN,
            BLOB_MAX_RETRIES,
            e.to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Download a blob and decode it into `T`.
pub(crate) async fn download_as<T: DeserializeOwned>(
    ctx: &TaskContext,
    attempt: &Attempt,
    url: &str,
) -> Result<T, TaskError> {
    let value = download(ctx, attempt, url).await?;
    serde_json::from_value(value).map_err(|e| TaskError::Blob(BlobError::Decode(e)))
}

/// Sample with its payload and parsed prior validations.
pub(crate) async fn hydrate_sample(
    ctx: &TaskContext,
    attempt: &Attempt,
    record: &SampleRecord,
    with_validations: bool,
) -> Result<Sample, TaskError> {
    let validations = if with_validations {
        sample_validations(ctx, attempt, &record.learner_id, record.id).await?
    } else {
        Vec::new()
    };
    let data: SensorData = download_as(ctx, attempt, &record.data).await?;

    Ok(Sample {
        sample_id: record.id,
        learner_id: record.learner_id.clone(),
        data,
        validations,
    })
}

/// Every sample not yet used by the learner's model, across all pages.
pub(crate) async fn unused_samples(
    ctx: &TaskContext,
    attempt: &Attempt,
    learner_id: &str,
) -> Result<Vec<Sample>, TaskError> {
    let mut samples = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = ctx
            .storage
            .list_unused_samples(ctx.provider_id, learner_id, cursor.as_deref())
            .await?;
        for record in &page.results {
            samples.push(hydrate_sample(ctx, attempt, record, true).await?);
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(samples)
}

/// Validations of one sample whose info parses into known validation data.
async fn sample_validations(
    ctx: &TaskContext,
    attempt: &Attempt,
    learner_id: &str,
    sample_id: i64,
) -> Result<Vec<ValidationData>, TaskError> {
    let mut parsed = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = ctx
            .storage
            .list_sample_validations(ctx.provider_id, learner_id, sample_id, cursor.as_deref())
            .await?;
        for validation in &page.results {
            let Some(url) = validation.info.as_deref() else {
                continue;
            };
            let info = download(ctx, attempt, url).await?;
            match ValidationData::parse(&info) {
                Some(data) => parsed.push(data),
                None => tracing::debug!(
                    sample_id,
                    validation_id = validation.id,
                    "Skipping unparseable validation info"
                ),
            }
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(parsed)
}
