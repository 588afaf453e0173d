//! Preference persistence: last location, collapsed flag, temperature unit.
//!
//! Reads happen once at startup. Writes are fire-and-forget: the in-memory
//! mirror is updated immediately and a background writer applies the change
//! to the backend in submission order. Storage failures are logged and never
//! roll back the mirror.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use newtab_core::PersistenceError;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::types::LocationPreference;
use crate::units::TemperatureUnit;

pub const LAST_LOCATION_KEY: &str = "lastWeatherLocation";
pub const COLLAPSED_KEY: &str = "weatherCollapsed";
pub const UNIT_KEY: &str = "tempUnit";

const KEYS: [&str; 3] = [LAST_LOCATION_KEY, COLLAPSED_KEY, UNIT_KEY];

/// Label used when a stored location has none
pub const FALLBACK_LOCATION_LABEL: &str = "Last Location";

/// Key/value pairs as stored.
pub type Entries = Map<String, Value>;

/// Synchronous key/value storage. Called off the async executor.
pub trait KeyValueBackend: Send + Sync {
    /// Fetch the given keys. Absent keys are simply missing from the result.
    fn get(&self, keys: &[&str]) -> Result<Entries, PersistenceError>;

    /// Merge `entries` into storage, overwriting existing keys.
    fn set(&self, entries: Entries) -> Result<(), PersistenceError>;
}

/// The three persisted preferences
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub location: Option<LocationPreference>,
    pub collapsed: bool,
    pub unit: TemperatureUnit,
}

impl Preferences {
    /// Decode stored entries, falling back per key on bad values.
    pub fn from_entries(entries: &Entries) -> Self {
        let unit = entries
            .get(UNIT_KEY)
            .and_then(Value::as_str)
            .and_then(TemperatureUnit::from_code)
            .unwrap_or_default();

        let collapsed = entries
            .get(COLLAPSED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let location = entries.get(LAST_LOCATION_KEY).and_then(|value| {
            let parsed = parse_location(value);
            if parsed.is_none() {
                tracing::debug!("Ignoring stored location without numeric lat/lon: {}", value);
            }
            parsed
        });

        Self {
            location,
            collapsed,
            unit,
        }
    }
}

fn parse_location(value: &Value) -> Option<LocationPreference> {
    let latitude = value.get("lat")?.as_f64()?;
    let longitude = value.get("lon")?.as_f64()?;

    let label = value
        .get("label")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .unwrap_or(FALLBACK_LOCATION_LABEL)
        .to_string();

    let saved_at = value
        .get("savedAt")
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Some(LocationPreference {
        label,
        latitude,
        longitude,
        saved_at,
    })
}

/// All preferences in a single JSON object file.
pub struct JsonFileBackend {
    path: PathBuf,
    // Serializes read-merge-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Entries, PersistenceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(PersistenceError::Corrupt(
                "preferences file is not a JSON object".to_string(),
            )),
            Err(e) => Err(PersistenceError::Corrupt(e.to_string())),
        }
    }
}

impl KeyValueBackend for JsonFileBackend {
    fn get(&self, keys: &[&str]) -> Result<Entries, PersistenceError> {
        let mut all = self.read_all()?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    fn set(&self, entries: Entries) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();

        let mut all = match self.read_all() {
            Ok(all) => all,
            Err(PersistenceError::Corrupt(msg)) => {
                tracing::warn!(
                    "Overwriting unreadable preferences at {}: {}",
                    self.path.display(),
                    msg
                );
                Entries::new()
            }
            Err(e) => return Err(e),
        };
        all.extend(entries);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(all))
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

/// In-process storage. Used for `--ephemeral` runs and tests.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<Entries>,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent read and write fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of everything stored
    pub fn entries(&self) -> Entries {
        self.entries.lock().clone()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory backend set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, keys: &[&str]) -> Result<Entries, PersistenceError> {
        self.check()?;
        let entries = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: Entries) -> Result<(), PersistenceError> {
        self.check()?;
        self.entries.lock().extend(entries);
        Ok(())
    }
}

/// Which preferences were saved through this store
#[derive(Debug, Default, Clone, Copy)]
struct Touched {
    location: bool,
    collapsed: bool,
    unit: bool,
}

#[derive(Debug, Default)]
struct Mirror {
    prefs: Preferences,
    touched: Touched,
}

enum WriteCommand {
    Set(Entries),
    Flush(oneshot::Sender<()>),
}

/// Preference store with an in-memory mirror and background writes.
pub struct PreferenceStore {
    backend: Arc<dyn KeyValueBackend>,
    mirror: Mutex<Mirror>,
    writer: mpsc::UnboundedSender<WriteCommand>,
}

impl PreferenceStore {
    /// Create a store over `backend`.
    ///
    /// Must be called from within a Tokio runtime; the background writer is
    /// spawned here and stops when the store is dropped.
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&backend), rx));

        Self {
            backend,
            mirror: Mutex::new(Mirror::default()),
            writer: tx,
        }
    }

    /// Read persisted preferences. Never fails: any storage problem yields
    /// the defaults.
    ///
    /// Values saved through this store before the read completes win over
    /// what the backend returned.
    pub async fn load(&self) -> Preferences {
        let backend = Arc::clone(&self.backend);
        let prefs = match tokio::task::spawn_blocking(move || backend.get(&KEYS)).await {
            Ok(Ok(entries)) => Preferences::from_entries(&entries),
            Ok(Err(e)) => {
                tracing::warn!("Failed to load preferences, using defaults: {}", e);
                Preferences::default()
            }
            Err(e) => {
                tracing::warn!("Preference load task failed, using defaults: {}", e);
                Preferences::default()
            }
        };

        let mut mirror = self.mirror.lock();
        let touched = mirror.touched;
        let current = &mut mirror.prefs;
        if !touched.location {
            current.location = prefs.location;
        }
        if !touched.collapsed {
            current.collapsed = prefs.collapsed;
        }
        if !touched.unit {
            current.unit = prefs.unit;
        }
        current.clone()
    }

    /// The in-memory view of the preferences
    pub fn current(&self) -> Preferences {
        self.mirror.lock().prefs.clone()
    }

    pub fn save_location(&self, location: &LocationPreference) {
        {
            let mut mirror = self.mirror.lock();
            mirror.prefs.location = Some(location.clone());
            mirror.touched.location = true;
        }

        match serde_json::to_value(location) {
            Ok(value) => self.enqueue(LAST_LOCATION_KEY, value),
            Err(e) => tracing::warn!("Failed to encode location preference: {}", e),
        }
    }

    pub fn save_collapsed(&self, collapsed: bool) {
        {
            let mut mirror = self.mirror.lock();
            mirror.prefs.collapsed = collapsed;
            mirror.touched.collapsed = true;
        }
        self.enqueue(COLLAPSED_KEY, Value::Bool(collapsed));
    }

    pub fn save_unit(&self, unit: TemperatureUnit) {
        {
            let mut mirror = self.mirror.lock();
            mirror.prefs.unit = unit;
            mirror.touched.unit = true;
        }
        self.enqueue(UNIT_KEY, Value::String(unit.code().to_string()));
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn enqueue(&self, key: &str, value: Value) {
        let mut entries = Entries::new();
        entries.insert(key.to_string(), value);

        if self.writer.send(WriteCommand::Set(entries)).is_err() {
            tracing::warn!("Preference writer stopped; dropping write of {}", key);
        }
    }
}

async fn run_writer(
    backend: Arc<dyn KeyValueBackend>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Set(entries) => {
                let keys: Vec<String> = entries.keys().cloned().collect();
                let backend = Arc::clone(&backend);

                match tokio::task::spawn_blocking(move || backend.set(entries)).await {
                    Ok(Ok(())) => tracing::debug!("Persisted {:?}", keys),
                    Ok(Err(e)) => tracing::warn!("Failed to persist {:?}: {}", keys, e),
                    Err(e) => tracing::warn!("Persist task for {:?} failed: {}", keys, e),
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::types::Coordinates;
    use serde_json::json;

    fn entries(value: Value) -> Entries {
        match value {
            Value::Object(map) => map,
            _ => Entries::new(),
        }
    }

    #[test]
    fn test_defaults_from_empty() {
        let prefs = Preferences::from_entries(&Entries::new());
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.unit, TemperatureUnit::Celsius);
        assert!(!prefs.collapsed);
        assert!(prefs.location.is_none());
    }

    #[test]
    fn test_from_entries_full() {
        let prefs = Preferences::from_entries(&entries(json!({
            "lastWeatherLocation": {"label": "Lima, Peru", "lat": -12.04, "lon": -77.03, "savedAt": 1_700_000_000_000_i64},
            "weatherCollapsed": true,
            "tempUnit": "K"
        })));

        assert_eq!(prefs.unit, TemperatureUnit::Kelvin);
        assert!(prefs.collapsed);
        let loc = prefs.location.unwrap();
        assert_eq!(loc.label, "Lima, Peru");
        assert_eq!(loc.coordinates(), Coordinates::new(-12.04, -77.03));
        assert_eq!(loc.saved_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_from_entries_rejects_bad_values() {
        let prefs = Preferences::from_entries(&entries(json!({
            "lastWeatherLocation": {"label": "Nowhere", "lat": "48.85", "lon": 2.35},
            "weatherCollapsed": "yes",
            "tempUnit": "R"
        })));

        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn test_missing_label_falls_back() {
        let prefs = Preferences::from_entries(&entries(json!({
            "lastWeatherLocation": {"lat": 1, "lon": 2}
        })));

        let loc = prefs.location.unwrap();
        assert_eq!(loc.label, FALLBACK_LOCATION_LABEL);
        assert_eq!(loc.latitude, 1.0);
    }

    #[test]
    fn test_file_backend_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("prefs.json"));
        assert_eq!(backend.path(), dir.path().join("prefs.json"));
        assert!(backend.get(&KEYS).unwrap().is_empty());
    }

    #[test]
    fn test_file_backend_merges_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested").join("prefs.json"));

        backend.set(entries(json!({"tempUnit": "F"}))).unwrap();
        backend.set(entries(json!({"weatherCollapsed": true}))).unwrap();
        backend.set(entries(json!({"tempUnit": "K"}))).unwrap();

        let stored = backend.get(&KEYS).unwrap();
        assert_eq!(stored.get(UNIT_KEY), Some(&json!("K")));
        assert_eq!(stored.get(COLLAPSED_KEY), Some(&json!(true)));
        assert!(!stored.contains_key(LAST_LOCATION_KEY));
    }

    #[test]
    fn test_file_backend_corrupt_read_and_recovering_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(&path);

        assert!(matches!(
            backend.get(&KEYS),
            Err(PersistenceError::Corrupt(_))
        ));

        backend.set(entries(json!({"tempUnit": "C"}))).unwrap();
        assert_eq!(backend.get(&[UNIT_KEY]).unwrap().get(UNIT_KEY), Some(&json!("C")));
    }

    #[tokio::test]
    async fn test_store_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = PreferenceStore::new(Arc::new(JsonFileBackend::new(&path)));
        store.save_unit(TemperatureUnit::Fahrenheit);
        store.save_collapsed(true);
        store.save_location(&LocationPreference::new(
            "Cairo, Egypt",
            Coordinates::new(30.04, 31.24),
        ));
        store.flush().await;

        let reopened = PreferenceStore::new(Arc::new(JsonFileBackend::new(&path)));
        let prefs = reopened.load().await;

        assert_eq!(prefs.unit, TemperatureUnit::Fahrenheit);
        assert!(prefs.collapsed);
        assert_eq!(prefs.location.unwrap().label, "Cairo, Egypt");
        assert_eq!(reopened.current().unit, TemperatureUnit::Fahrenheit);
    }

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        let store = PreferenceStore::new(backend.clone());

        for unit in [
            TemperatureUnit::Kelvin,
            TemperatureUnit::Fahrenheit,
            TemperatureUnit::Celsius,
            TemperatureUnit::Kelvin,
        ] {
            store.save_unit(unit);
        }
        store.flush().await;

        assert_eq!(backend.entries().get(UNIT_KEY), Some(&json!("K")));
    }

    #[tokio::test]
    async fn test_load_failure_yields_defaults() {
        let backend = Arc::new(MemoryBackend::with_entries(entries(json!({"tempUnit": "F"}))));
        backend.set_failing(true);
        let store = PreferenceStore::new(backend.clone());

        assert_eq!(store.load().await, Preferences::default());
    }

    #[tokio::test]
    async fn test_load_keeps_newer_local_choices() {
        let backend = Arc::new(MemoryBackend::with_entries(entries(json!({
            "tempUnit": "F",
            "weatherCollapsed": true
        }))));
        let store = PreferenceStore::new(backend.clone());

        store.save_unit(TemperatureUnit::Kelvin);
        let prefs = store.load().await;

        assert_eq!(prefs.unit, TemperatureUnit::Kelvin);
        assert!(prefs.collapsed);
        assert_eq!(store.current().unit, TemperatureUnit::Kelvin);

        store.flush().await;
        assert_eq!(backend.entries().get(UNIT_KEY), Some(&json!("K")));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_mirror() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_failing(true);
        let store = PreferenceStore::new(backend.clone());

        store.save_unit(TemperatureUnit::Kelvin);
        store.save_collapsed(true);
        store.flush().await;

        let current = store.current();
        assert_eq!(current.unit, TemperatureUnit::Kelvin);
        assert!(current.collapsed);

        backend.set_failing(false);
        assert!(backend.entries().is_empty());
    }
}
