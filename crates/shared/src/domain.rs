use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(VehicleTypeId);
id_newtype!(MakeId);
id_newtype!(ModelId);

/// Top-level vehicle category as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    #[serde(rename = "Id")]
    pub id: VehicleTypeId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(
        rename = "ElementName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub element_name: Option<String>,
}

/// Manufacturer scoped to a single vehicle type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleMake {
    #[serde(rename = "MakeId")]
    pub make_id: MakeId,
    #[serde(rename = "MakeName")]
    pub make_name: String,
    #[serde(rename = "VehicleTypeId")]
    pub vehicle_type_id: VehicleTypeId,
    #[serde(rename = "VehicleTypeName")]
    pub vehicle_type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleModel {
    #[serde(rename = "Make_ID")]
    pub make_id: MakeId,
    #[serde(rename = "Make_Name")]
    pub make_name: String,
    #[serde(rename = "Model_ID")]
    pub model_id: ModelId,
    #[serde(rename = "Model_Name")]
    pub model_name: String,
    #[serde(rename = "VehicleTypeId")]
    pub vehicle_type_id: VehicleTypeId,
    #[serde(rename = "VehicleTypeName")]
    pub vehicle_type_name: String,
}

/// One model lookup: a single make within a type, optionally pinned to a model year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuery {
    pub type_name: String,
    pub make_id: MakeId,
    pub year: Option<String>,
}

impl ModelQuery {
    /// Blank years collapse to `None` so no empty `modelyear` segment is ever sent.
    pub fn new(type_name: impl Into<String>, make_id: MakeId, year: Option<&str>) -> Self {
        let year = year
            .map(str::trim)
            .filter(|year| !year.is_empty())
            .map(str::to_string);
        Self {
            type_name: type_name.into(),
            make_id,
            year,
        }
    }
}
