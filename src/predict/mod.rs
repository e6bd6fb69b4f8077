mod catalog;
mod error;
mod ground_station;
mod lifetime;
mod pass_finder;
mod propagation;
mod status;
mod types;
mod visibility;

#[cfg(test)]
pub(crate) mod synthetic;

pub use catalog::Catalog;
pub use error::PredictError;
pub use ground_station::GroundStation;
pub use lifetime::{orbital_lifetime, DEFAULT_MIN_ALTITUDE_KM};
pub use pass_finder::{find_passes, SearchOptions};
pub use propagation::{Ephemeris, Satellite};
pub use status::StatusTable;
pub use types::{Observation, Pass, PassCriteria, SortOrder};
pub use visibility::{offset_time, refined_time_to_visibility, COARSE_STEP_MINUTES};
