//! Classified event + enrichment → canonical Flapjack event.

use crate::event::{
    CanonicalEvent, ClassifiedEvent, EnrichmentResult, EVENT_TYPE_SERVICE, HOST_CHECK,
};

/// Build the canonical record for `event`. Pure and deterministic.
pub fn translate(event: &ClassifiedEvent, enrichment: EnrichmentResult) -> CanonicalEvent {
    let check = event
        .service_name
        .clone()
        .unwrap_or_else(|| HOST_CHECK.to_string());

    CanonicalEvent {
        entity: event.host_name.clone(),
        check,
        event_type: EVENT_TYPE_SERVICE.to_string(),
        time: event.timestamp_secs,
        state: event.state,
        summary: event.output.clone(),
        details: render_details(&enrichment.tags),
        tags: enrichment.tags,
    }
}

/// Human-readable tag summary, e.g. `tags: [prod web]`.
pub fn render_details(tags: &[String]) -> String {
    format!("tags: [{}]", tags.join(" "))
}
