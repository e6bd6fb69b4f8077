use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

use crate::predict::error::{CatalogError, PredictError};
use crate::predict::types::{Pass, PassCriteria, SortOrder};
use crate::predict::visibility::{next_pass, offset_time, NextPass, COARSE_STEP_MINUTES};
use crate::predict::{Ephemeris, GroundStation};

/// Name prefixes of large constellations, skipped unless explicitly included.
pub const CONSTELLATION_PREFIXES: &[&str] = &[
    "COSMOS",
    "CENTISPACE",
    "FLOCK 4",
    "GAOFEN-",
    "GEESAT-",
    "GLOBALSTAR",
    "GONETS-",
    "HAWK-",
    "ICEYE-",
    "IRIDIUM",
    "JILIN-",
    "LEMUR-",
    "NUSAT-",
    "ONEWEB-",
    "QIANFAN-",
    "SITRO-AIS",
    "STARLINK",
    "YAOGAN",
];

/// Minutes skipped past a found rise before searching for the following pass.
const NEXT_PASS_GAP_MINUTES: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub start: DateTime<Utc>,
    pub step_minutes: f64,
    pub window_minutes: f64,
    pub order: SortOrder,
    pub find_all: bool,
}

impl SearchOptions {
    pub fn new(start: DateTime<Utc>, criteria: &PassCriteria) -> Self {
        Self {
            start,
            step_minutes: COARSE_STEP_MINUTES,
            window_minutes: criteria.max_minutes,
            order: SortOrder::SoonestFirst,
            find_all: false,
        }
    }
}

/// Passes found by a catalog scan, with counts of the entries looked at.
#[derive(Debug, Clone, Default)]
pub struct PassSearch {
    pub passes: Vec<Pass>,
    pub scanned: usize,
    pub checked: usize,
}

impl PassSearch {
    /// Highest-culminating pass; ties go to the earlier entry in the list.
    pub fn best(&self) -> Option<&Pass> {
        self.passes.iter().fold(None, |best: Option<&Pass>, pass| match best {
            Some(b) if b.max_elevation_deg >= pass.max_elevation_deg => Some(b),
            _ => Some(pass),
        })
    }

    pub fn soonest(&self) -> Option<&Pass> {
        self.passes
            .iter()
            .fold(None, |soonest: Option<&Pass>, pass| match soonest {
                Some(s) if s.minutes_away <= pass.minutes_away => Some(s),
                _ => Some(pass),
            })
    }
}

struct NameFilter {
    pattern: Option<Regex>,
    with_constellations: bool,
}

impl NameFilter {
    fn new(criteria: &PassCriteria) -> Result<Self, PredictError> {
        let pattern = criteria
            .pattern
            .as_deref()
            .map(|p| RegexBuilder::new(p).case_insensitive(criteria.ignore_case).build())
            .transpose()?;
        Ok(Self {
            pattern,
            with_constellations: criteria.with_constellations,
        })
    }

    fn accepts(&self, name: &str) -> bool {
        if !self.with_constellations
            && CONSTELLATION_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
        {
            return false;
        }
        self.pattern.as_ref().map_or(true, |re| re.is_match(name))
    }
}

/// Scans a catalog for passes over `station` matching `criteria`.
///
/// A catalog entry that fails to load aborts the whole scan. Entries that
/// cannot be propagated or never cross the horizon inside the window are
/// skipped. The result is sorted by minutes away; equal keys keep catalog
/// order.
pub fn find_passes<I, E>(
    catalog: I,
    station: &GroundStation,
    criteria: &PassCriteria,
    options: &SearchOptions,
) -> Result<PassSearch, PredictError>
where
    I: IntoIterator<Item = Result<E, CatalogError>>,
    E: Ephemeris,
{
    let filter = NameFilter::new(criteria)?;
    let mut search = PassSearch::default();

    for entry in catalog {
        let satellite = entry?;
        search.scanned += 1;

        let name = satellite.name().trim_end();
        if !filter.accepts(name) {
            continue;
        }

        let now = match satellite.observe(station, options.start) {
            Ok(observation) => observation,
            Err(e) => {
                log::warn!("Skipping {}: {}", name, e);
                continue;
            }
        };
        if now.altitude_km < criteria.min_altitude_km || now.altitude_km > criteria.max_altitude_km
        {
            continue;
        }
        search.checked += 1;

        collect_passes(&satellite, name, station, criteria, options, &mut search.passes)?;
    }

    match options.order {
        SortOrder::SoonestFirst => search
            .passes
            .sort_by(|a, b| a.minutes_away.total_cmp(&b.minutes_away)),
        SortOrder::LatestFirst => search
            .passes
            .sort_by(|a, b| b.minutes_away.total_cmp(&a.minutes_away)),
    }

    Ok(search)
}

fn collect_passes<E: Ephemeris>(
    satellite: &E,
    name: &str,
    station: &GroundStation,
    criteria: &PassCriteria,
    options: &SearchOptions,
    passes: &mut Vec<Pass>,
) -> Result<(), PredictError> {
    let mut offset = 0.0;

    while offset < options.window_minutes {
        let from = offset_time(options.start, offset);
        let horizon = options.window_minutes - offset;

        let (minutes, summary) =
            match next_pass(satellite, station, from, horizon, options.step_minutes) {
                Ok(NextPass::Upcoming { minutes, summary }) => (minutes, summary),
                Ok(NextPass::InProgress { minutes_since_rise }) => {
                    offset += (NEXT_PASS_GAP_MINUTES - minutes_since_rise).max(options.step_minutes);
                    continue;
                }
                Ok(NextPass::NotFound) => break,
                Err(PredictError::SweepIncomplete(limit)) => {
                    log::debug!("{}: pass sweep exceeded {} minutes", name, limit);
                    break;
                }
                Err(PredictError::Propagation(message)) => {
                    log::warn!("Skipping remaining passes of {}: {}", name, message);
                    break;
                }
                Err(e) => return Err(e),
            };

        let minutes_away = offset + minutes;
        offset += minutes + NEXT_PASS_GAP_MINUTES;

        if summary.minutes_above_0 <= 0.0
            || summary.max_elevation_deg > criteria.max_elevation_deg
            || summary.max_elevation_deg < criteria.min_elevation_deg
            || minutes_away < criteria.min_minutes
        {
            continue;
        }

        passes.push(Pass {
            satellite: name.to_string(),
            minutes_away,
            max_elevation_deg: summary.max_elevation_deg,
            max_altitude_km: summary.max_altitude_km,
            duration_minutes: summary.duration_minutes,
            rise_azimuth_deg: summary.rise_azimuth_deg,
            rise_time: summary.rise_time,
        });

        if !options.find_all {
            break;
        }
    }

    Ok(())
}
