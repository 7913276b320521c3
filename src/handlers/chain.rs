use super::{FormHandler, HandlerContext, HandlerRecord};
use crate::core::Result;
use crate::forms::BoundForm;
use std::sync::Arc;
use tracing::Instrument;

/// Runs every handler in ascending `order`, stopping at the first error.
///
/// Returns how many handlers ran.
pub async fn run_chain(
    handlers: &[Arc<HandlerRecord>],
    form: &BoundForm<'_>,
    ctx: &HandlerContext<'_>,
) -> Result<usize> {
    let mut ordered: Vec<&Arc<HandlerRecord>> = handlers.iter().collect();
    ordered.sort_by_key(|record| (record.base().order, record.base().id));

    let span = tracing::info_span!(
        "handler_chain",
        form = %form.class().name(),
        handlers = ordered.len()
    );

    async move {
        for record in &ordered {
            let handler = record.specific(ctx.storage).await?;
            log::debug!(
                "Running {} '{}' (order {})",
                handler.kind().verbose_name(),
                handler.name(),
                handler.base().order
            );
            if let Err(err) = handler.handle(form, ctx).await {
                log::warn!("Handler '{}' failed: {}", handler.name(), err);
                return Err(err);
            }
        }
        Ok(ordered.len())
    }
    .instrument(span)
    .await
}
