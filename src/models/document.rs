//! Helpers shared by the typed views over provider-native JSON documents.

use super::ResourceId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// A `{ "id": ... }` reference to another resource, as used throughout ARM.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubResource {
    pub id: ResourceId,
}

/// SKU block shared by load balancers and public IPs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Sku {
    pub name: String,
    #[serde(default)]
    pub tier: Option<String>,
}

impl Sku {
    pub fn is_standard(&self) -> bool {
        self.name.eq_ignore_ascii_case("Standard")
    }
}

/// Deserialize a typed view from a native document, reporting the JSON path on failure.
pub fn from_document<T: DeserializeOwned>(
    what: &str,
    document: &serde_json::Value,
) -> Result<T, Box<dyn Error>> {
    serde_path_to_error::deserialize(document.clone()).map_err(|e| {
        log::error!("DOCUMENT START:\n\n{document:#}\n\nDOCUMENT END\n");
        format!("Error parsing {what}: path={} error={}", e.path(), e).into()
    })
}

/// Azure reports zones as strings (`["1"]`); turn them into numbers.
pub fn parse_zones(zones: &[String]) -> Result<Vec<u8>, Box<dyn Error>> {
    zones
        .iter()
        .map(|z| {
            z.trim()
                .parse::<u8>()
                .map_err(|_| format!("Invalid zone '{z}'").into())
        })
        .collect()
}
