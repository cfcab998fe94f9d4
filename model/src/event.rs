use serde::{Deserialize, Serialize};

/// One scheduled arrival and departure of a bus at a stop. There's no
/// surrogate key; the full tuple identifies the row for update and delete.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub bus_id: String,
    pub stop_id: String,
    /// Seconds since midnight.
    pub arrival_time: u32,
    /// Seconds since midnight.
    pub departure_time: u32,
}

impl Event {
    pub fn new(bus_id: String, stop_id: String, arrival_time: u32, departure_time: u32) -> Self {
        Self {
            bus_id,
            stop_id,
            arrival_time,
            departure_time,
        }
    }
}
