//! One live track per canonical location.
//!
//! The registry only holds `Weak` references. A track lives as long as
//! something outside the registry owns it; dead entries are skipped on
//! lookup and dropped by [`TrackRegistry::prune`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError, Weak};

use log::{debug, info};

use crate::error::RegistryError;
use crate::location;
use crate::track::{Track, TrackContext, TrackSnapshot};

pub struct TrackRegistry {
    context: Arc<TrackContext>,
    tracks: RwLock<HashMap<String, Weak<Track>>>,
}

impl TrackRegistry {
    pub fn new(context: Arc<TrackContext>) -> Self {
        Self {
            context,
            tracks: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<TrackContext> {
        &self.context
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Weak<Track>>> {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Weak<Track>>> {
        self.tracks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live track for `location`, if any. Paths and URIs are both accepted.
    pub fn lookup(&self, location: &str) -> Option<Arc<Track>> {
        let canonical = location::canonicalize(location);
        self.read().get(&canonical).and_then(Weak::upgrade)
    }

    /// Returns the live track for `location`, creating and reading it first
    /// if there is none. A failed read still yields the track.
    pub fn resolve_or_create(&self, location: &str) -> Arc<Track> {
        let canonical = location::canonicalize(location);
        if let Some(track) = self.read().get(&canonical).and_then(Weak::upgrade) {
            return track;
        }

        let track = {
            let mut tracks = self.write();
            if let Some(track) = tracks.get(&canonical).and_then(Weak::upgrade) {
                return track;
            }
            let track = Arc::new(Track::at_location(self.context.clone(), canonical.clone()));
            tracks.insert(canonical.clone(), Arc::downgrade(&track));
            track
        };

        debug!("Created track for {}", canonical);
        // Failures are logged by read_tags; the track stays usable.
        let _ = track.read_tags();
        track
    }

    /// Associates `track` with its location.
    pub fn register(&self, track: &Arc<Track>) -> Result<(), RegistryError> {
        let location = track.location().ok_or(RegistryError::MissingLocation)?;
        let mut tracks = self.write();
        if let Some(existing) = tracks.get(&location).and_then(Weak::upgrade) {
            if !Arc::ptr_eq(&existing, track) {
                return Err(RegistryError::LocationTaken(location));
            }
        }
        tracks.insert(location, Arc::downgrade(track));
        Ok(())
    }

    /// Removes the entry for `track`'s location if it points at `track`.
    pub fn unregister(&self, track: &Arc<Track>) {
        let Some(location) = track.location() else {
            return;
        };
        let mut tracks = self.write();
        let owned = tracks
            .get(&location)
            .is_some_and(|entry| std::ptr::eq(entry.as_ptr(), Arc::as_ptr(track)));
        if owned {
            tracks.remove(&location);
        }
    }

    /// Moves `track` to `location`: unregister, rewrite `__loc`, register.
    ///
    /// Not atomic. If the new location is taken the error is returned and
    /// the track is left unregistered under its new `__loc`.
    pub fn relocate(&self, track: &Arc<Track>, location: &str) -> Result<(), RegistryError> {
        let canonical = location::canonicalize(location);
        self.unregister(track);
        track.set_location(canonical);
        self.register(track)
    }

    /// Rebuilds a track from a snapshot.
    ///
    /// A live track at the snapshot's location gets its bag replaced and is
    /// returned. A snapshot without `__loc` yields an unregistered track.
    pub fn restore(&self, snapshot: &TrackSnapshot) -> Arc<Track> {
        let Some(location) = snapshot.location() else {
            return Arc::new(Track::from_snapshot(self.context.clone(), snapshot));
        };

        let mut tracks = self.write();
        if let Some(existing) = tracks.get(&location).and_then(Weak::upgrade) {
            existing.restore_from(snapshot);
            return existing;
        }
        let track = Arc::new(Track::from_snapshot(self.context.clone(), snapshot));
        tracks.insert(location, Arc::downgrade(&track));
        track
    }

    /// Number of entries whose track is still alive.
    pub fn live_count(&self) -> usize {
        self.read()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Drops dead entries and returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut tracks = self.write();
        let before = tracks.len();
        tracks.retain(|_, entry| entry.strong_count() > 0);
        let removed = before - tracks.len();
        if removed > 0 {
            info!("Pruned {} dead track entries", removed);
        }
        removed
    }
}
