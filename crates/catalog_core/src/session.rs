//! Selection state machine driving the type → make → model narrowing flow.
//!
//! Every transition mutates [`SessionState`] under one lock and publishes a
//! [`SessionSnapshot`] before releasing it. Network calls always run outside the
//! lock; their results are applied only if the request generation that issued
//! them is still current.

use std::sync::Arc;

use shared::domain::{MakeId, VehicleMake, VehicleModel, VehicleType};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    aggregator::ModelAggregator,
    catalog::CatalogClient,
    error::{FailureKind, SelectionError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureContext {
    VehicleTypes,
    Makes,
    Models,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub context: FailureContext,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    LoadingMakes,
    LoadingModels,
    Error(SessionFailure),
}

impl SessionPhase {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionPhase::Error(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_type: String,
    /// Kept in the order the makes were picked; that order drives result order.
    pub selected_make_ids: Vec<MakeId>,
    pub year_filter_enabled: bool,
    pub year_value: String,
}

impl SelectionState {
    /// The year to forward to model lookups, if the filter is on.
    pub fn effective_year(&self) -> Option<&str> {
        self.year_filter_enabled.then_some(self.year_value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub selection: SelectionState,
    pub vehicle_types: Vec<VehicleType>,
    pub makes: Vec<VehicleMake>,
    pub models: Vec<VehicleModel>,
    pub has_searched: bool,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed { models: usize },
    Failed(SessionFailure),
    /// A search was already in flight.
    Ignored,
    /// A type change landed while the search was running.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    Failed(SessionFailure),
    Stale,
}

struct SessionState {
    phase: SessionPhase,
    selection: SelectionState,
    vehicle_types: Vec<VehicleType>,
    makes: Vec<VehicleMake>,
    models: Vec<VehicleModel>,
    has_searched: bool,
    types_generation: u64,
    makes_generation: u64,
    models_generation: u64,
    types_in_flight: bool,
    makes_in_flight: bool,
    search_in_flight: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            selection: SelectionState::default(),
            vehicle_types: Vec::new(),
            makes: Vec::new(),
            models: Vec::new(),
            has_searched: false,
            types_generation: 0,
            makes_generation: 0,
            models_generation: 0,
            types_in_flight: false,
            makes_in_flight: false,
            search_in_flight: false,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            selection: self.selection.clone(),
            vehicle_types: self.vehicle_types.clone(),
            makes: self.makes.clone(),
            models: self.models.clone(),
            has_searched: self.has_searched,
        }
    }

    /// Phase implied by whatever is still outstanding.
    fn settle_phase(&mut self) {
        self.phase = if self.search_in_flight {
            SessionPhase::LoadingModels
        } else if self.makes_in_flight || self.types_in_flight {
            SessionPhase::LoadingMakes
        } else {
            SessionPhase::Idle
        };
    }

    fn fail(
        &mut self,
        context: FailureContext,
        kind: FailureKind,
        message: String,
    ) -> SessionFailure {
        let failure = SessionFailure {
            context,
            kind,
            message,
        };
        self.phase = SessionPhase::Error(failure.clone());
        failure
    }
}

pub struct CatalogSession {
    client: Arc<dyn CatalogClient>,
    aggregator: ModelAggregator,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl CatalogSession {
    pub fn new(client: Arc<dyn CatalogClient>) -> Arc<Self> {
        Self::with_event_capacity(client, 1024)
    }

    pub fn with_event_capacity(client: Arc<dyn CatalogClient>, capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            aggregator: ModelAggregator::new(client.clone()),
            client,
            inner: Mutex::new(SessionState::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    fn publish(&self, state: &SessionState) {
        let _ = self
            .events
            .send(SessionEvent::StateChanged(state.snapshot()));
    }

    /// One-time load of the vehicle type list.
    pub async fn bootstrap(&self) -> LoadOutcome {
        self.refresh_vehicle_types().await
    }

    pub async fn refresh_vehicle_types(&self) -> LoadOutcome {
        let generation = {
            let mut guard = self.inner.lock().await;
            guard.types_generation += 1;
            guard.types_in_flight = true;
            guard.settle_phase();
            self.publish(&guard);
            guard.types_generation
        };

        let result = self.client.fetch_vehicle_types().await;

        let mut guard = self.inner.lock().await;
        if generation != guard.types_generation {
            debug!(generation, "discarding stale vehicle type response");
            return LoadOutcome::Stale;
        }
        guard.types_in_flight = false;
        let outcome = match result {
            Ok(types) => {
                info!(count = types.len(), "vehicle types loaded");
                guard.vehicle_types = types;
                guard.settle_phase();
                LoadOutcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "failed to load vehicle types");
                LoadOutcome::Failed(guard.fail(
                    FailureContext::VehicleTypes,
                    err.kind(),
                    err.to_string(),
                ))
            }
        };
        self.publish(&guard);
        outcome
    }

    /// Switches the active type, dropping make selections and results tied to the old one.
    pub async fn select_type(&self, type_name: impl Into<String>) -> LoadOutcome {
        let (generation, type_name) = {
            let mut guard = self.inner.lock().await;
            guard.selection.selected_type = type_name.into();
            guard.selection.selected_make_ids.clear();
            guard.makes.clear();
            guard.models.clear();
            guard.has_searched = false;
            // An in-flight search for the previous type can no longer land.
            guard.models_generation += 1;
            guard.search_in_flight = false;
            self.begin_makes_load(&mut guard)
        };
        self.finish_makes_load(generation, type_name).await
    }

    /// Re-issues the make lookup for the current type, typically after a failure.
    pub async fn retry_makes(&self) -> LoadOutcome {
        let (generation, type_name) = {
            let mut guard = self.inner.lock().await;
            self.begin_makes_load(&mut guard)
        };
        self.finish_makes_load(generation, type_name).await
    }

    /// Claims a new make generation; must run under the same lock as any selection change.
    fn begin_makes_load(&self, state: &mut SessionState) -> (u64, String) {
        state.makes_generation += 1;
        state.makes_in_flight = true;
        state.settle_phase();
        self.publish(state);
        (state.makes_generation, state.selection.selected_type.clone())
    }

    async fn finish_makes_load(&self, generation: u64, type_name: String) -> LoadOutcome {
        debug!(vehicle_type = %type_name, generation, "loading makes");
        let result = self.client.fetch_makes(&type_name).await;

        let mut guard = self.inner.lock().await;
        if generation != guard.makes_generation {
            debug!(
                vehicle_type = %type_name,
                generation,
                current = guard.makes_generation,
                "discarding stale make response"
            );
            return LoadOutcome::Stale;
        }
        guard.makes_in_flight = false;
        let outcome = match result {
            Ok(makes) => {
                info!(vehicle_type = %type_name, count = makes.len(), "makes loaded");
                guard.makes = makes;
                guard.settle_phase();
                LoadOutcome::Applied
            }
            Err(err) => {
                warn!(vehicle_type = %type_name, error = %err, "failed to load makes");
                LoadOutcome::Failed(guard.fail(FailureContext::Makes, err.kind(), err.to_string()))
            }
        };
        self.publish(&guard);
        outcome
    }

    pub async fn set_year_filter_enabled(&self, enabled: bool) {
        let mut guard = self.inner.lock().await;
        guard.selection.year_filter_enabled = enabled;
        self.publish(&guard);
    }

    pub async fn set_year_value(&self, year: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        guard.selection.year_value = year.into();
        self.publish(&guard);
    }

    pub async fn select_make(&self, make_id: MakeId) -> Result<(), SelectionError> {
        let mut guard = self.inner.lock().await;
        ensure_offered(&guard, make_id)?;
        if !guard.selection.selected_make_ids.contains(&make_id) {
            guard.selection.selected_make_ids.push(make_id);
            self.publish(&guard);
        }
        Ok(())
    }

    pub async fn deselect_make(&self, make_id: MakeId) {
        let mut guard = self.inner.lock().await;
        let before = guard.selection.selected_make_ids.len();
        guard.selection.selected_make_ids.retain(|id| *id != make_id);
        if guard.selection.selected_make_ids.len() != before {
            self.publish(&guard);
        }
    }

    /// Replaces the whole selection; nothing changes if any id is unknown.
    pub async fn set_selected_makes(&self, make_ids: &[MakeId]) -> Result<(), SelectionError> {
        let mut guard = self.inner.lock().await;
        for make_id in make_ids {
            ensure_offered(&guard, *make_id)?;
        }
        let mut selected = Vec::with_capacity(make_ids.len());
        for make_id in make_ids {
            if !selected.contains(make_id) {
                selected.push(*make_id);
            }
        }
        guard.selection.selected_make_ids = selected;
        self.publish(&guard);
        Ok(())
    }

    /// Runs one aggregation for the current selection. Models are replaced only when
    /// every lookup succeeds; on failure the previous table stays in place.
    pub async fn search(&self) -> SearchOutcome {
        let (generation, type_name, make_ids, year) = {
            let mut guard = self.inner.lock().await;
            if guard.search_in_flight {
                debug!("search already in flight; ignoring trigger");
                return SearchOutcome::Ignored;
            }
            guard.search_in_flight = true;
            guard.models_generation += 1;
            guard.settle_phase();
            self.publish(&guard);
            let selection = &guard.selection;
            (
                guard.models_generation,
                selection.selected_type.clone(),
                selection.selected_make_ids.clone(),
                selection.effective_year().map(str::to_string),
            )
        };

        info!(
            vehicle_type = %type_name,
            makes = make_ids.len(),
            year = year.as_deref().unwrap_or(""),
            "searching models"
        );
        let result = self
            .aggregator
            .aggregate(&type_name, &make_ids, year.as_deref())
            .await;

        let mut guard = self.inner.lock().await;
        if generation != guard.models_generation {
            debug!(generation, "discarding superseded search result");
            return SearchOutcome::Superseded;
        }
        guard.search_in_flight = false;
        let outcome = match result {
            Ok(models) => {
                let count = models.len();
                guard.models = models;
                guard.has_searched = true;
                guard.settle_phase();
                SearchOutcome::Completed { models: count }
            }
            Err(err) => SearchOutcome::Failed(guard.fail(
                FailureContext::Models,
                err.source.kind(),
                err.to_string(),
            )),
        };
        self.publish(&guard);
        outcome
    }
}

fn ensure_offered(state: &SessionState, make_id: MakeId) -> Result<(), SelectionError> {
    if state.makes.iter().any(|make| make.make_id == make_id) {
        Ok(())
    } else {
        Err(SelectionError::UnknownMake {
            make_id,
            vehicle_type: state.selection.selected_type.clone(),
        })
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
