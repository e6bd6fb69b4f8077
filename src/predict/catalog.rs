use std::fs;
use std::path::Path;

use crate::predict::error::CatalogError;
use crate::predict::propagation::Satellite;

/// Raw name + element lines, parsed into a propagator only on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

impl CatalogRecord {
    pub fn satellite(&self) -> Result<Satellite, CatalogError> {
        Satellite::from_tle(&self.name, &self.line1, &self.line2)
    }
}

/// Catalog of two-line element sets, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        let catalog = Self::parse(&content)?;
        log::info!("Loaded {} TLE records from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parses 3-line records (name, line 1, line 2). Bare 2-line sets are
    /// named after their catalog number. Any line that does not fit one of
    /// those shapes fails the whole parse.
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let lines: Vec<&str> = content
            .lines()
            .map(|l| l.trim_end())
            .filter(|l| !l.trim().is_empty())
            .collect();

        let mut records = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let (name, first) = if lines[i].starts_with("1 ") {
                let norad = lines[i].get(2..7).unwrap_or("").trim();
                (format!("NORAD {}", norad), i)
            } else if lines[i].starts_with("2 ") {
                return Err(CatalogError::InvalidElements {
                    name: format!("line {}", i + 1),
                    message: "element line 2 without a preceding line 1".to_string(),
                });
            } else {
                (lines[i].trim().to_string(), i + 1)
            };

            let line1 = match lines.get(first) {
                Some(line) if line.starts_with("1 ") => *line,
                Some(line) => {
                    return Err(CatalogError::InvalidElements {
                        name,
                        message: format!("expected element line 1, found {:?}", line),
                    })
                }
                None => return Err(CatalogError::Truncated(name)),
            };
            let line2 = match lines.get(first + 1) {
                Some(line) if line.starts_with("2 ") => *line,
                Some(line) => {
                    return Err(CatalogError::InvalidElements {
                        name,
                        message: format!("expected element line 2, found {:?}", line),
                    })
                }
                None => return Err(CatalogError::Truncated(name)),
            };

            records.push(CatalogRecord {
                name,
                line1: line1.to_string(),
                line2: line2.to_string(),
            });
            i = first + 2;
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    /// First record whose name starts with `name`.
    pub fn find(&self, name: &str) -> Result<Satellite, CatalogError> {
        self.records
            .iter()
            .find(|r| r.name.starts_with(name))
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?
            .satellite()
    }

    /// Every record in file order, each parsed as it is reached.
    pub fn satellites(&self) -> impl Iterator<Item = Result<Satellite, CatalogError>> + '_ {
        self.records.iter().map(CatalogRecord::satellite)
    }
}
