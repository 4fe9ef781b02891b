//! Persistence bridge: the primary raid save block, the single-use emergency
//! slot, and the storage seam both are written through.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::catalog::Difficulty;
use crate::session::{ActiveDefinition, RaidProfile, RaidSession};
use crate::stats::{RaidStatistics, RecentCompletions, SpecialRewardInventory};

/// Scalar copy of the definition in force, enough to rebuild a degraded stand-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub risk_percentage: Option<u8>,
}

impl DefinitionSnapshot {
    #[must_use]
    pub fn of(definition: &ActiveDefinition) -> Self {
        Self {
            name: Some(definition.name().to_string()),
            difficulty: Some(definition.difficulty()),
            duration_ms: Some(definition.duration_ms()),
            risk_percentage: Some(definition.risk_percentage()),
        }
    }
}

/// Primary active-session slot. Absent or null fields mean "no active session".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimarySlot {
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default)]
    pub definition_snapshot: Option<DefinitionSnapshot>,
    #[serde(default)]
    pub start_time_ms: Option<u64>,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub automation_was_active: bool,
}

impl PrimarySlot {
    #[must_use]
    pub fn from_session(session: &RaidSession) -> Self {
        Self {
            active_session_id: Some(session.definition.id().to_string()),
            definition_snapshot: Some(DefinitionSnapshot::of(&session.definition)),
            start_time_ms: Some(session.start_time_ms),
            progress_percent: session.progress_percent,
            automation_was_active: session.automation_was_active,
        }
    }

    /// Whether any session marker survived. A partially populated slot still
    /// counts; restore decides whether it can be salvaged.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active_session_id.is_some() || self.start_time_ms.is_some()
    }
}

/// Everything the raid engine keeps in the durable game save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaidSaveBlock {
    #[serde(default)]
    pub active: PrimarySlot,
    #[serde(default)]
    pub statistics: RaidStatistics,
    #[serde(default)]
    pub completed: RecentCompletions,
    #[serde(default)]
    pub special_rewards: SpecialRewardInventory,
    /// Fingerprint of the catalog the active session was started against.
    #[serde(default)]
    pub catalog_fingerprint: Option<u64>,
}

impl RaidSaveBlock {
    /// Repair values older or hand-edited saves may carry.
    pub fn sanitize(&mut self, history_cap: usize, history_keep: usize) {
        if !self.active.progress_percent.is_finite() {
            self.active.progress_percent = 0.0;
        }
        self.active.progress_percent = self.active.progress_percent.clamp(0.0, 100.0);
        self.completed.enforce(history_cap, history_keep);
        self.special_rewards.sanitize();
    }
}

/// Secondary record written synchronously right before the host may vanish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyBackup {
    #[serde(default)]
    pub raid_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_time_ms: Option<u64>,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub automation_was_active: bool,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub saved_at_ms: u64,
    #[serde(default)]
    pub emergency_flag: bool,
}

impl EmergencyBackup {
    #[must_use]
    pub fn from_session(session: &RaidSession, saved_at_ms: u64) -> Self {
        Self {
            raid_id: Some(session.definition.id().to_string()),
            name: Some(session.definition.name().to_string()),
            start_time_ms: Some(session.start_time_ms),
            progress_percent: session.progress_percent,
            automation_was_active: session.automation_was_active,
            difficulty: Some(session.definition.difficulty()),
            saved_at_ms,
            emergency_flag: true,
        }
    }

    /// View the backup as a primary slot so both go through the same restore path.
    #[must_use]
    pub fn to_primary(&self) -> PrimarySlot {
        PrimarySlot {
            active_session_id: self.raid_id.clone(),
            definition_snapshot: Some(DefinitionSnapshot {
                name: self.name.clone(),
                difficulty: self.difficulty,
                duration_ms: None,
                risk_percentage: None,
            }),
            start_time_ms: self.start_time_ms,
            progress_percent: self.progress_percent,
            automation_was_active: self.automation_was_active,
        }
    }
}

/// Errors raised by snapshot storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for the two raid slots.
/// Platform hosts provide this; the engine never assumes a medium.
pub trait SnapshotStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist the primary save block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be written.
    fn save_primary(&self, block: &RaidSaveBlock) -> Result<(), Self::Error>;

    /// Load the primary save block, `None` on a fresh profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the block exists but cannot be read.
    fn load_primary(&self) -> Result<Option<RaidSaveBlock>, Self::Error>;

    /// Write the emergency slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn write_emergency(&self, backup: &EmergencyBackup) -> Result<(), Self::Error>;

    /// Read the emergency slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be decoded.
    fn read_emergency(&self) -> Result<Option<EmergencyBackup>, Self::Error>;

    /// Delete the emergency slot; deleting an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed.
    fn delete_emergency(&self) -> Result<(), Self::Error>;
}

#[derive(Debug, Default)]
struct MemorySlots {
    primary: Option<String>,
    emergency: Option<String>,
    fail_writes: bool,
}

/// In-memory store holding serialized JSON. Clones share the same slots, so a
/// store outlives the engine that wrote it the way a browser save outlives a tab.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slots: Rc<RefCell<MemorySlots>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw primary JSON, if any.
    #[must_use]
    pub fn raw_primary(&self) -> Option<String> {
        self.slots.borrow().primary.clone()
    }

    /// Raw emergency JSON, if any.
    #[must_use]
    pub fn raw_emergency(&self) -> Option<String> {
        self.slots.borrow().emergency.clone()
    }

    /// Overwrite the emergency slot with arbitrary text.
    pub fn put_raw_emergency(&self, raw: &str) {
        self.slots.borrow_mut().emergency = Some(raw.to_string());
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.slots.borrow_mut().fail_writes = fail;
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.slots.borrow().fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    type Error = StoreError;

    fn save_primary(&self, block: &RaidSaveBlock) -> Result<(), Self::Error> {
        self.check_writable()?;
        let json = serde_json::to_string(block)?;
        self.slots.borrow_mut().primary = Some(json);
        Ok(())
    }

    fn load_primary(&self) -> Result<Option<RaidSaveBlock>, Self::Error> {
        let slots = self.slots.borrow();
        slots
            .primary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StoreError::from)
    }

    fn write_emergency(&self, backup: &EmergencyBackup) -> Result<(), Self::Error> {
        self.check_writable()?;
        let json = serde_json::to_string(backup)?;
        self.slots.borrow_mut().emergency = Some(json);
        Ok(())
    }

    fn read_emergency(&self) -> Result<Option<EmergencyBackup>, Self::Error> {
        let slots = self.slots.borrow();
        slots
            .emergency
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StoreError::from)
    }

    fn delete_emergency(&self) -> Result<(), Self::Error> {
        self.slots.borrow_mut().emergency = None;
        Ok(())
    }
}

const PRIMARY_FILE: &str = "raids.save.json";
const EMERGENCY_FILE: &str = "raids.emergency.json";

/// File-backed store: one JSON file per slot inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_atomic(&self, name: &str, json: &str) -> Result<(), StoreError> {
        let target = self.dir.join(name);
        let staging = self.dir.join(format!("{name}.tmp"));
        fs::write(&staging, json)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn read_optional(&self, name: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.dir.join(name)) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    type Error = StoreError;

    fn save_primary(&self, block: &RaidSaveBlock) -> Result<(), Self::Error> {
        let json = serde_json::to_string_pretty(block)?;
        self.write_atomic(PRIMARY_FILE, &json)
    }

    fn load_primary(&self) -> Result<Option<RaidSaveBlock>, Self::Error> {
        self.read_optional(PRIMARY_FILE)?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn write_emergency(&self, backup: &EmergencyBackup) -> Result<(), Self::Error> {
        let json = serde_json::to_string(backup)?;
        self.write_atomic(EMERGENCY_FILE, &json)
    }

    fn read_emergency(&self) -> Result<Option<EmergencyBackup>, Self::Error> {
        self.read_optional(EMERGENCY_FILE)?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn delete_emergency(&self) -> Result<(), Self::Error> {
        match fs::remove_file(self.dir.join(EMERGENCY_FILE)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Best-effort wrapper the engine persists through. Failures are logged and
/// swallowed so a broken medium never wedges the state machine.
#[derive(Debug, Clone)]
pub struct PersistenceBridge<S> {
    store: S,
}

impl<S: SnapshotStore> PersistenceBridge<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Write the primary block. Returns whether the write landed.
    pub fn checkpoint(&self, block: &RaidSaveBlock) -> bool {
        match self.store.save_primary(block) {
            Ok(()) => true,
            Err(err) => {
                log::error!("raid checkpoint failed: {err}");
                false
            }
        }
    }

    /// Load the primary block; unreadable data is treated as a fresh profile.
    #[must_use]
    pub fn load(&self) -> Option<RaidSaveBlock> {
        match self.store.load_primary() {
            Ok(block) => block,
            Err(err) => {
                log::error!("raid save unreadable, starting clean: {err}");
                None
            }
        }
    }

    /// Write the emergency slot. Returns whether the write landed.
    pub fn write_emergency(&self, backup: &EmergencyBackup) -> bool {
        match self.store.write_emergency(backup) {
            Ok(()) => true,
            Err(err) => {
                log::error!("emergency raid backup failed: {err}");
                false
            }
        }
    }

    /// Read and delete the emergency slot. The slot is removed whether or not
    /// it could be decoded.
    pub fn take_emergency(&self) -> Option<EmergencyBackup> {
        let backup = match self.store.read_emergency() {
            Ok(backup) => backup,
            Err(err) => {
                log::warn!("emergency raid backup unreadable, discarding: {err}");
                None
            }
        };
        if let Err(err) = self.store.delete_emergency() {
            log::error!("failed to delete emergency raid backup: {err}");
        }
        backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RaidCatalog;

    fn session() -> RaidSession {
        let def = RaidCatalog::fallback().raids.remove(0);
        let mut session = RaidSession::new(ActiveDefinition::Full(def), 5_000, true);
        session.refresh_progress(65_000);
        session
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "gridraid-store-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn empty_slot_json_reads_as_inactive() {
        let block: RaidSaveBlock = serde_json::from_str("{}").unwrap();
        assert!(!block.active.is_active());
        let block: RaidSaveBlock = serde_json::from_str(
            r#"{"active":{"active_session_id":null,"start_time_ms":null}}"#,
        )
        .unwrap();
        assert!(!block.active.is_active());
    }

    #[test]
    fn primary_slot_copies_session() {
        let slot = PrimarySlot::from_session(&session());
        assert_eq!(slot.active_session_id.as_deref(), Some("city_ruins"));
        assert_eq!(slot.start_time_ms, Some(5_000));
        assert!((slot.progress_percent - 50.0).abs() < f64::EPSILON);
        let snapshot = slot.definition_snapshot.unwrap();
        assert_eq!(snapshot.duration_ms, Some(120_000));
        assert_eq!(snapshot.risk_percentage, Some(20));
    }

    #[test]
    fn emergency_backup_maps_onto_primary_shape() {
        let backup = EmergencyBackup::from_session(&session(), 70_000);
        assert!(backup.emergency_flag);
        let slot = backup.to_primary();
        assert_eq!(slot.active_session_id.as_deref(), Some("city_ruins"));
        assert_eq!(slot.start_time_ms, Some(5_000));
        assert!(slot.automation_was_active);
        assert_eq!(
            slot.definition_snapshot.and_then(|s| s.duration_ms),
            None,
            "emergency slot does not carry timing"
        );
    }

    #[test]
    fn sanitize_clamps_progress_and_ring() {
        let mut block = RaidSaveBlock::default();
        block.active.progress_percent = f64::NAN;
        block.sanitize(50, 25);
        assert!(block.active.progress_percent.abs() < f64::EPSILON);
        block.active.progress_percent = 250.0;
        block.sanitize(50, 25);
        assert!((block.active.progress_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bridge_take_emergency_consumes_even_corrupt_slot() {
        let store = MemorySnapshotStore::new();
        store.put_raw_emergency("{not json");
        let bridge = PersistenceBridge::new(store.clone());
        assert!(bridge.take_emergency().is_none());
        assert!(store.raw_emergency().is_none());
    }

    #[test]
    fn bridge_swallows_write_failures() {
        let store = MemorySnapshotStore::new();
        store.set_fail_writes(true);
        let bridge = PersistenceBridge::new(store.clone());
        assert!(!bridge.checkpoint(&RaidSaveBlock::default()));
        assert!(store.raw_primary().is_none());
        store.set_fail_writes(false);
        assert!(bridge.checkpoint(&RaidSaveBlock::default()));
        assert!(bridge.load().is_some());
    }

    #[test]
    fn file_store_roundtrips_both_slots() {
        let dir = temp_dir("files");
        let store = JsonFileStore::open(&dir).unwrap();
        assert!(store.load_primary().unwrap().is_none());
        assert!(store.read_emergency().unwrap().is_none());
        store.delete_emergency().unwrap();

        let mut block = RaidSaveBlock::default();
        block.active = PrimarySlot::from_session(&session());
        block.statistics.total_raids = 4;
        store.save_primary(&block).unwrap();
        assert_eq!(store.load_primary().unwrap(), Some(block));

        let backup = EmergencyBackup::from_session(&session(), 9);
        store.write_emergency(&backup).unwrap();
        assert_eq!(store.read_emergency().unwrap(), Some(backup));
        store.delete_emergency().unwrap();
        assert!(store.read_emergency().unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }
}
