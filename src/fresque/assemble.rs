use super::{extract::is_training, LocationBlock, RawEvent};
use crate::geocode::{AddressResolver, ResolvedAddress};
use crate::{EventRecord, Rejection};
use tracing::warn;

/// Rejection checks in fixed order; the first hit drops the record. A
/// resolver transport failure is indistinguishable from "no match" here.
pub(crate) async fn assemble<R: AddressResolver + Sync>(
    source_id: u32,
    page_url: &str,
    raw: &RawEvent,
    resolver: &R,
) -> Result<EventRecord, Rejection> {
    let Some(schedule) = raw.schedule else {
        return Err(Rejection::BadTimeFormat);
    };

    let (full_location_text, venue_name, street_address, city) = match &raw.location {
        LocationBlock::Online => Default::default(),
        LocationBlock::TooManyParts { parts, .. } => {
            return Err(Rejection::AddressTooLong(*parts))
        }
        LocationBlock::Parsed {
            raw,
            venue,
            street,
            city,
        } => (raw.clone(), venue.clone(), street.clone(), city.clone()),
    };

    let resolved = if raw.is_online {
        ResolvedAddress::default()
    } else {
        if street_address.is_empty() {
            return Err(Rejection::EmptyAddress);
        }
        let resolved = match resolver.resolve(&street_address, &city).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("address resolver unavailable: {e}");
                ResolvedAddress::default()
            }
        };
        if resolved.department_code.is_empty() {
            return Err(Rejection::UnresolvedAddress);
        }
        resolved
    };

    Ok(EventRecord {
        source_id,
        title: raw.title.clone(),
        start_time: schedule.start,
        end_time: schedule.end,
        full_location_text,
        venue_name,
        street_address,
        city,
        department_code: resolved.department_code,
        postal_code: resolved.postal_code,
        latitude: resolved.latitude,
        longitude: resolved.longitude,
        is_online: raw.is_online,
        is_training: is_training(&raw.title),
        // No extraction rule sets these yet; full events are filtered out
        // during link collection.
        is_sold_out: false,
        is_kid_friendly: false,
        event_page_url: page_url.to_string(),
        ticket_url: raw.ticket_url.clone(),
        description: raw.description.clone(),
    })
}
