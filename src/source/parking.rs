use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Parkings list as returned by the API and stored in archived snapshots.
///
/// ```json
/// {"Items": [{"Id": "0001", "FreePlaces": 5, "Position": {"Lat": 55.7, "Lon": 37.6}, ...}]}
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parkings {
    #[serde(default)]
    pub items: Vec<Parking>,
}

/// Geographic position of a parking station
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Raw parking station snapshot, exactly as decoded.
///
/// Every field is optional on the wire; [`Station::try_from`] decides which
/// ones are required.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parking {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub position: Option<Position>,
    pub free_places: Option<u32>,
    pub free_electric_places: Option<u32>,
    pub free_ordinary_places: Option<u32>,
    pub total_places: Option<u32>,
    pub total_electric_places: Option<u32>,
    pub total_ordinary_places: Option<u32>,
    pub has_terminal: Option<bool>,
    pub is_favourite: Option<bool>,
    pub is_locked: Option<bool>,
    #[serde(default)]
    pub station_types: Vec<String>,
}

/// Validated station snapshot.
///
/// `id`, `free_places` (the tracked occupancy) and the position are required;
/// descriptive text defaults to empty, counters to zero and flags to false.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub free_places: u32,
    pub free_electric_places: u32,
    pub free_ordinary_places: u32,
    pub total_places: u32,
    pub total_electric_places: u32,
    pub total_ordinary_places: u32,
    pub has_terminal: bool,
    pub is_favourite: bool,
    pub is_locked: bool,
    pub station_types: Vec<String>,
}

impl TryFrom<Parking> for Station {
    type Error = IngestError;

    fn try_from(parking: Parking) -> Result<Self, Self::Error> {
        let id = parking.id.ok_or(IngestError::MalformedSnapshot {
            station: None,
            field: "Id",
        })?;

        let missing = |field: &'static str| IngestError::MalformedSnapshot {
            station: Some(id.clone()),
            field,
        };

        let free_places = parking.free_places.ok_or_else(|| missing("FreePlaces"))?;
        let position = parking.position.ok_or_else(|| missing("Position"))?;
        let latitude = position.lat.ok_or_else(|| missing("Position.Lat"))?;
        let longitude = position.lon.ok_or_else(|| missing("Position.Lon"))?;

        Ok(Station {
            name: parking.name.unwrap_or_default(),
            address: parking.address.unwrap_or_default(),
            latitude,
            longitude,
            free_places,
            free_electric_places: parking.free_electric_places.unwrap_or(0),
            free_ordinary_places: parking.free_ordinary_places.unwrap_or(0),
            total_places: parking.total_places.unwrap_or(0),
            total_electric_places: parking.total_electric_places.unwrap_or(0),
            total_ordinary_places: parking.total_ordinary_places.unwrap_or(0),
            has_terminal: parking.has_terminal.unwrap_or(false),
            is_favourite: parking.is_favourite.unwrap_or(false),
            is_locked: parking.is_locked.unwrap_or(false),
            station_types: parking.station_types,
            id,
        })
    }
}
