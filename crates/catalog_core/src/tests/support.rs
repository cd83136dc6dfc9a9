//! In-memory catalog used by aggregator and session tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::domain::{
    MakeId, ModelId, ModelQuery, VehicleMake, VehicleModel, VehicleType, VehicleTypeId,
};
use tokio::sync::oneshot;

use crate::{catalog::CatalogClient, error::RemoteFetchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    VehicleTypes,
    Makes(String),
    Models(ModelQuery),
}

pub struct FakeCatalog {
    types: Vec<VehicleType>,
    makes: HashMap<String, Vec<VehicleMake>>,
    models: HashMap<MakeId, Vec<VehicleModel>>,
    fail_types: bool,
    failing_make_types: HashSet<String>,
    failing_models: HashSet<MakeId>,
    model_delays: HashMap<MakeId, Duration>,
    types_gate: Mutex<Option<(oneshot::Receiver<()>, Vec<VehicleType>)>>,
    make_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    model_gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<CatalogCall>>,
    models_in_flight: AtomicUsize,
    max_models_in_flight: AtomicUsize,
}

pub fn vehicle_type(id: i64, name: &str) -> VehicleType {
    VehicleType {
        id: VehicleTypeId(id),
        name: name.to_string(),
        element_name: Some("Vehicle Type".to_string()),
    }
}

pub fn make(id: i64, name: &str, type_name: &str) -> VehicleMake {
    VehicleMake {
        make_id: MakeId(id),
        make_name: name.to_string(),
        vehicle_type_id: VehicleTypeId(2),
        vehicle_type_name: type_name.to_string(),
    }
}

pub fn model(make_id: i64, model_id: i64, name: &str) -> VehicleModel {
    VehicleModel {
        make_id: MakeId(make_id),
        make_name: format!("MAKE {make_id}"),
        model_id: ModelId(model_id),
        model_name: name.to_string(),
        vehicle_type_id: VehicleTypeId(2),
        vehicle_type_name: "Car".to_string(),
    }
}

/// Two types, two makes for "Car", one for "Truck", and two models per car make.
pub fn standard_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with_types(vec![vehicle_type(2, "Car"), vehicle_type(3, "Truck")])
        .with_makes(
            "Car",
            vec![make(440, "ASTON MARTIN", "Car"), make(441, "TESLA", "Car")],
        )
        .with_makes("Truck", vec![make(448, "TOYOTA", "Truck")])
        .with_models(440, vec![model(440, 1684, "V8 Vantage"), model(440, 1685, "DB9")])
        .with_models(441, vec![model(441, 1685, "Model S"), model(441, 10199, "Model X")])
        .with_models(448, vec![model(448, 2208, "Tacoma")])
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            makes: HashMap::new(),
            models: HashMap::new(),
            fail_types: false,
            failing_make_types: HashSet::new(),
            failing_models: HashSet::new(),
            model_delays: HashMap::new(),
            types_gate: Mutex::new(None),
            make_gates: Mutex::new(HashMap::new()),
            model_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            models_in_flight: AtomicUsize::new(0),
            max_models_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_types(mut self, types: Vec<VehicleType>) -> Self {
        self.types = types;
        self
    }

    pub fn with_makes(mut self, type_name: &str, makes: Vec<VehicleMake>) -> Self {
        self.makes.insert(type_name.to_string(), makes);
        self
    }

    pub fn with_models(mut self, make_id: i64, models: Vec<VehicleModel>) -> Self {
        self.models.insert(MakeId(make_id), models);
        self
    }

    pub fn failing_types(mut self) -> Self {
        self.fail_types = true;
        self
    }

    pub fn failing_makes_for(mut self, type_name: &str) -> Self {
        self.failing_make_types.insert(type_name.to_string());
        self
    }

    pub fn failing_models_for(mut self, make_id: i64) -> Self {
        self.failing_models.insert(MakeId(make_id));
        self
    }

    pub fn with_model_delay(mut self, make_id: i64, delay: Duration) -> Self {
        self.model_delays.insert(MakeId(make_id), delay);
        self
    }

    /// The next type lookup pends until the returned sender fires or drops, then
    /// answers with `types` instead of the configured list.
    pub fn gate_next_types(&self, types: Vec<VehicleType>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.types_gate.lock().expect("gate") = Some((rx, types));
        tx
    }

    /// Make lookups for `type_name` pend until the returned sender fires or drops.
    pub fn gate_makes(&self, type_name: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.make_gates
            .lock()
            .expect("gates")
            .insert(type_name.to_string(), rx);
        tx
    }

    /// The next model lookup pends until the returned sender fires or drops.
    pub fn gate_next_model(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.model_gate.lock().expect("gate") = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn make_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CatalogCall::Makes(type_name) => Some(type_name),
                _ => None,
            })
            .collect()
    }

    pub fn model_calls(&self) -> Vec<ModelQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CatalogCall::Models(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn max_models_in_flight(&self) -> usize {
        self.max_models_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: CatalogCall) {
        self.calls.lock().expect("calls").push(call);
    }

    fn server_error(url: String) -> RemoteFetchError {
        RemoteFetchError::status(url, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleType>, RemoteFetchError> {
        self.record(CatalogCall::VehicleTypes);
        let gate = self.types_gate.lock().expect("gate").take();
        if let Some((gate, types)) = gate {
            let _ = gate.await;
            return Ok(types);
        }
        tokio::task::yield_now().await;
        if self.fail_types {
            return Err(Self::server_error("fake://types".into()));
        }
        Ok(self.types.clone())
    }

    async fn fetch_makes(&self, type_name: &str) -> Result<Vec<VehicleMake>, RemoteFetchError> {
        self.record(CatalogCall::Makes(type_name.to_string()));
        if type_name.trim().is_empty() {
            return Ok(Vec::new());
        }

        let gate = self.make_gates.lock().expect("gates").remove(type_name);
        if let Some(gate) = gate {
            let _ = gate.await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.failing_make_types.contains(type_name) {
            return Err(Self::server_error(format!("fake://makes/{type_name}")));
        }
        Ok(self.makes.get(type_name).cloned().unwrap_or_default())
    }

    async fn fetch_models(
        &self,
        query: &ModelQuery,
    ) -> Result<Vec<VehicleModel>, RemoteFetchError> {
        self.record(CatalogCall::Models(query.clone()));

        let now_in_flight = self.models_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_models_in_flight
            .fetch_max(now_in_flight, Ordering::SeqCst);

        let gate = self.model_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let delay = self
            .model_delays
            .get(&query.make_id)
            .copied()
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;

        self.models_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_models.contains(&query.make_id) {
            return Err(Self::server_error(format!(
                "fake://models/{}",
                query.make_id.0
            )));
        }
        Ok(self.models.get(&query.make_id).cloned().unwrap_or_default())
    }
}
