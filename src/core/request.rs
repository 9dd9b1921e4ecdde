use crate::ai::{check_response, LlmClient, LlmError};

use super::options::PipelineOptions;

/// Send one request, bounded by the configured timeout and, when enabled,
/// abandoned on Ctrl-C. Error-tagged text comes back as an `Err`.
pub async fn query_bounded(
    client: &dyn LlmClient,
    prompt: &str,
    system_prompt: &str,
    options: &PipelineOptions,
) -> Result<String, LlmError> {
    log::debug!(
        "Querying {} ({} prompt chars, {} system chars)",
        client.name(),
        prompt.len(),
        system_prompt.len()
    );

    let request = tokio::time::timeout(
        options.llm_timeout,
        client.query(prompt, Some(system_prompt), options.model.as_deref()),
    );

    let outcome = if options.cancel_on_interrupt {
        tokio::select! {
            outcome = request => outcome,
            _ = tokio::signal::ctrl_c() => return Err(LlmError::Cancelled),
        }
    } else {
        request.await
    };

    match outcome {
        Ok(response) => check_response(response?),
        Err(_) => Err(LlmError::Timeout(options.llm_timeout)),
    }
}
