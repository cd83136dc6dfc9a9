use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use shared::domain::{MakeId, ModelQuery, VehicleModel};
use tracing::{debug, info, warn};

use crate::{catalog::CatalogClient, error::AggregationError};

/// Fans one model lookup out per selected make and joins them all-or-nothing.
#[derive(Clone)]
pub struct ModelAggregator {
    client: Arc<dyn CatalogClient>,
}

impl ModelAggregator {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self { client }
    }

    /// Output keeps `make_ids` order, each make's models in server order.
    /// No sorting or de-duplication is applied.
    pub async fn aggregate(
        &self,
        type_name: &str,
        make_ids: &[MakeId],
        year: Option<&str>,
    ) -> Result<Vec<VehicleModel>, AggregationError> {
        if make_ids.is_empty() {
            debug!(vehicle_type = type_name, "no makes selected; skipping model lookups");
            return Ok(Vec::new());
        }

        let queries: Vec<ModelQuery> = make_ids
            .iter()
            .map(|make_id| ModelQuery::new(type_name, *make_id, year))
            .collect();
        debug!(
            vehicle_type = type_name,
            makes = queries.len(),
            year = queries[0].year.as_deref().unwrap_or(""),
            "fanning out model lookups"
        );

        let mut lookups: FuturesUnordered<_> = queries
            .iter()
            .enumerate()
            .map(|(index, query)| async move {
                let result = self
                    .client
                    .fetch_models(query)
                    .await
                    .map_err(|source| AggregationError {
                        make_id: query.make_id,
                        source,
                    });
                (index, result)
            })
            .collect();

        // Lookups land in completion order; slots restore selection order.
        let mut slots: Vec<Option<Vec<VehicleModel>>> = vec![None; queries.len()];
        while let Some((index, result)) = lookups.next().await {
            match result {
                Ok(models) => slots[index] = Some(models),
                Err(err) => {
                    warn!(make_id = err.make_id.0, error = %err.source, "model aggregation failed");
                    // Dropping `lookups` cancels whatever is still pending.
                    return Err(err);
                }
            }
        }

        let models: Vec<VehicleModel> = slots.into_iter().flatten().flatten().collect();
        info!(
            vehicle_type = type_name,
            makes = make_ids.len(),
            models = models.len(),
            "model aggregation complete"
        );
        Ok(models)
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
