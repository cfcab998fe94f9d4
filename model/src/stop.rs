use serde::{Deserialize, Serialize};

/// A transit stop. Rider counts change during simulation; the previous count
/// sticks around so boarding deltas can be computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    riders: u32,
    previous_riders: u32,
}

impl Stop {
    pub fn new(id: String, name: String, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name,
            latitude,
            longitude,
            riders: 0,
            previous_riders: 0,
        }
    }

    pub(crate) fn from_row(
        id: String,
        name: String,
        riders: u32,
        previous_riders: u32,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id,
            name,
            latitude,
            longitude,
            riders,
            previous_riders,
        }
    }

    pub fn riders(&self) -> u32 {
        self.riders
    }

    pub fn previous_riders(&self) -> u32 {
        self.previous_riders
    }

    /// Updates the rider count, remembering the old one. Setting the same
    /// value again doesn't clobber the history.
    pub fn set_riders(&mut self, riders: u32) {
        if riders != self.riders {
            self.previous_riders = self.riders;
            self.riders = riders;
        }
    }
}
