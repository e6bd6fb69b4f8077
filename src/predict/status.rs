use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::predict::error::CatalogError;

const FIELD_COUNT: usize = 8;

/// One line of the satellite status file:
/// `name;id;uplink MHz;downlink MHz;beacon MHz;mode;callsign;status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SatelliteStatus {
    pub name: String,
    pub id: String,
    pub uplink_mhz: String,
    pub downlink_mhz: String,
    pub beacon_mhz: String,
    pub mode: String,
    pub callsign: String,
    pub status: String,
}

impl SatelliteStatus {
    fn parse_line(line: &str) -> Self {
        let mut fields = line
            .splitn(FIELD_COUNT, ';')
            .map(|f| f.trim().to_string());
        let mut next = || fields.next().unwrap_or_default();
        Self {
            name: next(),
            id: next(),
            uplink_mhz: next(),
            downlink_mhz: next(),
            beacon_mhz: next(),
            mode: next(),
            callsign: next(),
            status: next(),
        }
    }

    pub fn uplink_hz(&self) -> Option<f64> {
        first_frequency_hz(&self.uplink_mhz)
    }

    pub fn downlink_hz(&self) -> Option<f64> {
        first_frequency_hz(&self.downlink_mhz)
    }

    pub fn beacon_hz(&self) -> Option<f64> {
        first_frequency_hz(&self.beacon_mhz)
    }
}

/// Leading MHz figure of a field such as `435.800-435.850` or `145.900 FM`.
fn first_frequency_hz(field: &str) -> Option<f64> {
    let end = field
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(field.len());
    field[..end]
        .parse::<f64>()
        .ok()
        .filter(|mhz| *mhz > 0.0)
        .map(|mhz| (mhz * 1e6).round())
}

#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    entries: Vec<SatelliteStatus>,
}

impl StatusTable {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let table = Self::parse(&fs::read_to_string(path)?);
        log::info!(
            "Loaded {} satellite status entries from {}",
            table.entries().len(),
            path.display()
        );
        Ok(table)
    }

    /// Lines starting with `#` and blank lines are skipped.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .map(SatelliteStatus::parse_line)
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SatelliteStatus] {
        &self.entries
    }

    /// Exact name match first, then the first entry whose name starts
    /// with the catalog name or vice versa.
    pub fn lookup(&self, name: &str) -> Option<&SatelliteStatus> {
        let name = name.trim();
        self.entries.iter().find(|e| e.name == name).or_else(|| {
            self.entries
                .iter()
                .find(|e| !e.name.is_empty() && (name.starts_with(&e.name) || e.name.starts_with(name)))
        })
    }
}
