use std::collections::{BTreeSet, HashMap, HashSet};

use super::archive::GtfsArchive;
use super::error::PipelineError;
use super::records::{Stop, StopId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StopInfo {
    /// Rider facing code, or the stop id when the feed leaves the code blank.
    pub code: String,
    pub name: String,
}

/// Lookups between internal stop ids, public stop codes and display names.
#[derive(Debug, Default)]
pub struct StopIndex {
    by_id: HashMap<StopId, StopInfo>,
    by_code: HashMap<String, StopId>,
}

impl StopIndex {
    pub fn load(archive: &mut GtfsArchive) -> Result<Self, PipelineError> {
        log::info!("Mapping stop ids, codes and names from {}", Stop::TABLE);
        let mut index = StopIndex::default();
        for stop in archive.rows::<Stop>(Stop::TABLE, Stop::REQUIRED)? {
            index.insert(stop?);
        }
        log::debug!(
            "Mapped {} stops, {} with a stop code",
            index.by_id.len(),
            index.by_code.len()
        );
        Ok(index)
    }

    pub fn insert(&mut self, stop: Stop) {
        let code = stop.stop_code.trim();
        if !code.is_empty() {
            self.by_code.insert(code.to_string(), stop.stop_id.clone());
        }
        let info = StopInfo {
            code: if code.is_empty() {
                stop.stop_id.0.clone()
            } else {
                code.to_string()
            },
            name: stop.stop_name.trim().to_string(),
        };
        self.by_id.insert(stop.stop_id, info);
    }

    pub fn get(&self, stop_id: &StopId) -> Option<&StopInfo> {
        self.by_id.get(stop_id)
    }

    pub fn id_for_code(&self, code: &str) -> Option<&StopId> {
        self.by_code.get(code)
    }

    /// Converts public stop codes to internal ids. Unknown codes are logged and dropped.
    pub fn resolve_codes(&self, codes: &BTreeSet<String>) -> HashSet<StopId> {
        let mut ids = HashSet::new();
        for code in codes {
            match self.id_for_code(code) {
                Some(stop_id) => {
                    ids.insert(stop_id.clone());
                }
                None => log::warn!("Stop code {code} not found in {}. Ignoring.", Stop::TABLE),
            }
        }
        ids
    }
}
