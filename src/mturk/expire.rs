// Expire every HIT of a group so no new worker can pick it up.

use super::{hits_in_group, BatchSummary, Marketplace, MarketplaceError};
use tracing::info;

#[derive(Debug, Default)]
pub struct ExpireOutcome {
    pub summary: BatchSummary,
    /// New expiration (epoch seconds) reported for each expired HIT.
    pub expirations: Vec<(String, Option<i64>)>,
}

/// Listing failures abort; a failure on a single HIT is recorded and the
/// rest of the group is still processed.
pub fn expire_hit_group<M: Marketplace + ?Sized>(
    market: &M,
    group_id: &str,
) -> Result<ExpireOutcome, MarketplaceError> {
    let hits = hits_in_group(market, group_id, None)?;
    let mut outcome = ExpireOutcome::default();
    for hit in hits {
        let result = market
            .expire_hit(&hit.hit_id)
            .and_then(|()| market.get_hit(&hit.hit_id));
        match result {
            Ok(updated) => {
                info!(hit_id = %hit.hit_id, expiration = ?updated.expiration, "expired");
                outcome.expirations.push((hit.hit_id.clone(), updated.expiration));
                outcome.summary.record(&hit.hit_id, Ok(()));
            }
            Err(e) => outcome.summary.record(&hit.hit_id, Err(e)),
        }
    }
    Ok(outcome)
}
