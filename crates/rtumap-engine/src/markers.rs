//! Marker Registry: the only owner of record-identity → surface-marker
//! mappings.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtumap_core::{Coordinates, LeadScore, LeadTier, LocationRecord, RecordId};

use crate::surface::{InfoWindowContent, MapSurface, MarkerIcon, MarkerSpec, SurfaceMarkerId};

const PLACEMENT_TITLE: &str = "New location";

/// Identity a marker is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKey {
    Record(RecordId),
    /// The single marker dropped for a location that has no record yet.
    Placement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerHandle {
    pub key: MarkerKey,
    pub surface_id: SurfaceMarkerId,
}

/// Maps a lead score to its marker color.
#[must_use]
pub fn icon_for(score: LeadScore) -> MarkerIcon {
    match score.tier() {
        LeadTier::None => MarkerIcon::Default,
        LeadTier::Bad => MarkerIcon::Red,
        LeadTier::Fair => MarkerIcon::Orange,
        LeadTier::Good | LeadTier::Excellent => MarkerIcon::Green,
    }
}

/// Keeps the markers on a [`MapSurface`] in step with a record set.
///
/// Every method applies its surface calls and its table update under one
/// lock, so no caller observes a half-applied change. After each call the
/// record-keyed markers equal exactly the records handed in, plus at most
/// one [`MarkerKey::Placement`] marker.
pub struct MarkerRegistry {
    surface: Arc<dyn MapSurface>,
    handles: Mutex<HashMap<MarkerKey, SurfaceMarkerId>>,
}

impl MarkerRegistry {
    pub fn new(surface: Arc<dyn MapSurface>) -> Self {
        Self {
            surface,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MarkerKey, SurfaceMarkerId>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the record's marker, or moves and re-icons it in place.
    ///
    /// Returns `None` for records without an id or coordinates, which
    /// cannot be shown.
    pub fn upsert(&self, record: &LocationRecord) -> Option<MarkerHandle> {
        let mut handles = self.lock();
        self.upsert_locked(&mut handles, record)
    }

    fn upsert_locked(
        &self,
        handles: &mut HashMap<MarkerKey, SurfaceMarkerId>,
        record: &LocationRecord,
    ) -> Option<MarkerHandle> {
        let (Some(id), Some(position)) = (record.id, record.coordinates) else {
            tracing::debug!(id = ?record.id, "record cannot be shown without id and coordinates");
            return None;
        };

        let key = MarkerKey::Record(id);
        let spec = MarkerSpec {
            position,
            icon: icon_for(record.lead_score),
            title: record.display_name().to_string(),
            draggable: false,
        };
        let surface_id = match handles.get(&key).copied() {
            Some(existing) => {
                self.surface.update_marker(existing, &spec);
                existing
            }
            None => {
                let created = self.surface.create_marker(&spec);
                handles.insert(key, created);
                created
            }
        };
        Some(MarkerHandle { key, surface_id })
    }

    /// Drops the placement marker at `position`, moving it if one exists.
    pub fn place(&self, position: Coordinates) -> MarkerHandle {
        let mut handles = self.lock();
        let spec = MarkerSpec {
            position,
            icon: MarkerIcon::Default,
            title: PLACEMENT_TITLE.to_string(),
            draggable: true,
        };
        let surface_id = match handles.get(&MarkerKey::Placement).copied() {
            Some(existing) => {
                self.surface.update_marker(existing, &spec);
                existing
            }
            None => {
                let created = self.surface.create_marker(&spec);
                handles.insert(MarkerKey::Placement, created);
                created
            }
        };
        MarkerHandle {
            key: MarkerKey::Placement,
            surface_id,
        }
    }

    /// Removes a record's marker. Unknown ids are ignored.
    pub fn remove(&self, id: RecordId) {
        if let Some(surface_id) = self.lock().remove(&MarkerKey::Record(id)) {
            self.surface.remove_marker(surface_id);
        }
    }

    pub fn clear_placement(&self) {
        if let Some(surface_id) = self.lock().remove(&MarkerKey::Placement) {
            self.surface.remove_marker(surface_id);
        }
    }

    /// Removes every marker, placement included.
    pub fn clear(&self) {
        let mut handles = self.lock();
        for (_, surface_id) in handles.drain() {
            self.surface.remove_marker(surface_id);
        }
    }

    /// Replaces all record markers with exactly those of `records`.
    ///
    /// Existing markers are reused where the id survives; the placement
    /// marker is left alone.
    pub fn sync(&self, records: &[LocationRecord]) {
        let mut handles = self.lock();
        let keep: HashSet<MarkerKey> = records
            .iter()
            .filter(|r| r.coordinates.is_some())
            .filter_map(|r| r.id.map(MarkerKey::Record))
            .collect();

        let stale: Vec<MarkerKey> = handles
            .keys()
            .filter(|key| matches!(key, MarkerKey::Record(_)) && !keep.contains(key))
            .copied()
            .collect();
        for key in stale {
            if let Some(surface_id) = handles.remove(&key) {
                self.surface.remove_marker(surface_id);
            }
        }

        for record in records {
            self.upsert_locked(&mut handles, record);
        }
    }

    /// Opens the info window for a record, rendered from the snapshot
    /// passed in. Returns `false` when the record has no marker.
    pub fn open_info(&self, record: &LocationRecord) -> bool {
        let Some(id) = record.id else {
            return false;
        };
        let Some(surface_id) = self.lock().get(&MarkerKey::Record(id)).copied() else {
            return false;
        };
        self.surface
            .open_info_window(surface_id, &InfoWindowContent::for_record(record));
        true
    }

    /// Opens an info window on the placement marker, if there is one.
    pub fn open_placement_info(&self, content: &InfoWindowContent) -> bool {
        let Some(surface_id) = self.lock().get(&MarkerKey::Placement).copied() else {
            return false;
        };
        self.surface.open_info_window(surface_id, content);
        true
    }

    #[must_use]
    pub fn handle(&self, key: MarkerKey) -> Option<MarkerHandle> {
        self.lock()
            .get(&key)
            .map(|surface_id| MarkerHandle {
                key,
                surface_id: *surface_id,
            })
    }

    /// Reverse lookup from a surface id reported by a click.
    #[must_use]
    pub fn key_of(&self, surface_id: SurfaceMarkerId) -> Option<MarkerKey> {
        self.lock()
            .iter()
            .find(|(_, id)| **id == surface_id)
            .map(|(key, _)| *key)
    }

    /// Ids of every record that currently has a marker.
    #[must_use]
    pub fn record_ids(&self) -> BTreeSet<RecordId> {
        self.lock()
            .keys()
            .filter_map(|key| match key {
                MarkerKey::Record(id) => Some(*id),
                MarkerKey::Placement => None,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{HeadlessSurface, Viewport};

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    fn setup() -> (Arc<HeadlessSurface>, MarkerRegistry) {
        let surface = Arc::new(HeadlessSurface::new(Viewport {
            center: coords(40.4406, -79.9959),
            zoom: 16,
        }));
        let registry = MarkerRegistry::new(surface.clone());
        (surface, registry)
    }

    fn record(id: i64, rtu_count: u32) -> LocationRecord {
        let mut record = LocationRecord {
            id: Some(RecordId(id)),
            address: format!("{id} Main St"),
            coordinates: Some(coords(40.44, -79.99)),
            ..LocationRecord::default()
        };
        record.set_rtu_count(rtu_count);
        record
    }

    #[test]
    fn icon_mapping_follows_tier() {
        assert_eq!(icon_for(LeadScore::from_rtu_count(0)), MarkerIcon::Default);
        assert_eq!(icon_for(LeadScore::from_rtu_count(3)), MarkerIcon::Red);
        assert_eq!(icon_for(LeadScore::from_rtu_count(8)), MarkerIcon::Orange);
        assert_eq!(icon_for(LeadScore::from_rtu_count(15)), MarkerIcon::Green);
        assert_eq!(icon_for(LeadScore::from_raw(40)), MarkerIcon::Green);
    }

    #[test]
    fn upsert_updates_in_place() {
        let (surface, registry) = setup();
        let first = registry.upsert(&record(1, 2)).unwrap();
        let second = registry.upsert(&record(1, 12)).unwrap();

        assert_eq!(first.surface_id, second.surface_id);
        assert_eq!(surface.markers().len(), 1);
        assert_eq!(
            surface.marker(first.surface_id).unwrap().icon,
            MarkerIcon::Green
        );
    }

    #[test]
    fn upsert_skips_unlocated_records() {
        let (surface, registry) = setup();
        let mut unlocated = record(1, 2);
        unlocated.coordinates = None;
        assert!(registry.upsert(&unlocated).is_none());
        assert!(surface.markers().is_empty());
    }

    #[test]
    fn single_placement_marker() {
        let (surface, registry) = setup();
        let a = registry.place(coords(1.0, 1.0));
        let b = registry.place(coords(2.0, 2.0));
        assert_eq!(a.surface_id, b.surface_id);
        assert_eq!(surface.markers().len(), 1);
        assert!(surface.marker(a.surface_id).unwrap().draggable);

        registry.clear_placement();
        assert!(surface.markers().is_empty());
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let (surface, registry) = setup();
        registry.upsert(&record(1, 2));
        registry.remove(RecordId(99));
        assert_eq!(surface.markers().len(), 1);
        assert_eq!(registry.record_ids(), BTreeSet::from([RecordId(1)]));
    }

    #[test]
    fn sync_replaces_record_markers_and_keeps_placement() {
        let (surface, registry) = setup();
        registry.upsert(&record(1, 2));
        registry.upsert(&record(2, 2));
        registry.place(coords(1.0, 1.0));

        registry.sync(&[record(2, 7), record(3, 1)]);

        assert_eq!(
            registry.record_ids(),
            BTreeSet::from([RecordId(2), RecordId(3)])
        );
        assert!(registry.handle(MarkerKey::Placement).is_some());
        assert_eq!(surface.markers().len(), 3);
    }

    #[test]
    fn clear_removes_everything() {
        let (surface, registry) = setup();
        registry.upsert(&record(1, 2));
        registry.place(coords(1.0, 1.0));
        registry.clear();
        assert!(registry.is_empty());
        assert!(surface.markers().is_empty());
    }

    #[test]
    fn open_info_uses_given_snapshot() {
        let (surface, registry) = setup();
        let handle = registry.upsert(&record(1, 2)).unwrap();

        let mut renamed = record(1, 2);
        renamed.building_name = "Warehouse".to_string();
        assert!(registry.open_info(&renamed));

        let (anchor, content) = surface.info_window().unwrap();
        assert_eq!(anchor, handle.surface_id);
        assert_eq!(content.heading, "Warehouse");
        assert_eq!(registry.key_of(anchor), Some(MarkerKey::Record(RecordId(1))));
    }
}
