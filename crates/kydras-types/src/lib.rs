//! Shared types for the Kydras storage engine.
//!
//! This crate defines the data model used across the Kydras workspace:
//! the pool identifier ([`PoolId`]), pool and drive descriptions
//! ([`StoragePool`], [`PoolDrive`]), placement rules ([`PoolRule`]),
//! drive classification ([`DriveClass`], [`DriveHealth`], [`DriveTier`]),
//! persisted replica rows ([`ReplicaRecord`]), and the relative-path
//! sanitizer ([`sanitize_rel_path`]).

mod relpath;

pub use relpath::{PathError, sanitize_rel_path};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Pool identifier
// ---------------------------------------------------------------------------

/// Stable opaque identifier for a storage pool.
///
/// Pools live in memory for the process lifetime; the ID is the only part
/// of a pool that outlives it, as the key of persisted replica rows.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(Uuid);

impl PoolId {
    /// Generate a fresh random pool ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PoolId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for PoolId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Drive classification
// ---------------------------------------------------------------------------

/// Device class of a pool drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveClass {
    /// Rotational disk.
    Hdd,
    /// SATA/SAS solid state.
    Ssd,
    /// NVMe solid state.
    Nvme,
    /// Network mount (SMB/NFS/UNC).
    Network,
    /// USB stick, SD card, or other removable media.
    Removable,
}

impl DriveClass {
    /// Relative IO throughput weight used by the placement scheduler.
    pub fn io_score(&self) -> f64 {
        match self {
            DriveClass::Nvme => 3.0,
            DriveClass::Ssd => 2.0,
            DriveClass::Hdd => 1.0,
            DriveClass::Network => 0.8,
            DriveClass::Removable => 0.6,
        }
    }

    /// Performance tier derived from the device class.
    pub fn tier(&self) -> DriveTier {
        match self {
            DriveClass::Nvme | DriveClass::Ssd => DriveTier::Hot,
            DriveClass::Hdd => DriveTier::Warm,
            DriveClass::Network | DriveClass::Removable => DriveTier::Cold,
        }
    }
}

/// Observed health of a pool drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveHealth {
    /// Never probed.
    Unknown,
    /// Sentinel write/delete succeeded.
    Healthy,
    /// Probe failed or the root does not exist.
    Warning,
    /// Persistent errors; drive should not receive new replicas.
    Critical,
    /// Drive is gone.
    Failed,
}

/// Coarse performance tier, derived from [`DriveClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveTier {
    /// NVMe / SSD.
    Hot,
    /// HDD.
    Warm,
    /// Network / removable media.
    Cold,
}

// ---------------------------------------------------------------------------
// Pool type
// ---------------------------------------------------------------------------

/// Informational pool flavour. Does not change engine behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolType {
    /// Just a bunch of disks.
    Jbod,
    /// Mirrored durability focus.
    Mirror,
    /// Throughput focus.
    Performance,
    /// Cold data focus.
    Archive,
    /// Anything else.
    #[default]
    Custom,
}

impl PoolType {
    /// Parse a pool type from a user-supplied name, case-insensitively.
    ///
    /// Unrecognized names map to [`PoolType::Custom`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jbod" => PoolType::Jbod,
            "mirror" => PoolType::Mirror,
            "performance" => PoolType::Performance,
            "archive" => PoolType::Archive,
            _ => PoolType::Custom,
        }
    }
}

// ---------------------------------------------------------------------------
// Drives and rules
// ---------------------------------------------------------------------------

/// A filesystem root participating in a pool. Unit of replica placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDrive {
    /// Root directory files are placed under.
    pub root_path: PathBuf,
    /// Derived volume root (e.g. `C:\` or `/`). Informational.
    pub volume_root: PathBuf,
    /// Windows-style drive letter (`C:`), when the root has one.
    pub drive_letter: Option<String>,
    /// Human label.
    pub label: String,
    /// Total volume size in bytes. 0 when unknown.
    pub total_size: u64,
    /// Free bytes on the volume. 0 when unknown.
    pub free_space: u64,
    /// Device class.
    pub class: DriveClass,
    /// Last observed health state.
    pub health: DriveHealth,
    /// Performance tier, derived from the class.
    pub tier: DriveTier,
    /// When the drive was last probed.
    pub last_health_check: DateTime<Utc>,
}

impl PoolDrive {
    /// Create a drive record for a root path with the given class.
    ///
    /// Size and free space start at 0 (unknown) until the first probe;
    /// health starts [`DriveHealth::Unknown`].
    pub fn new(root_path: impl Into<PathBuf>, class: DriveClass) -> Self {
        let root_path = root_path.into();
        let volume_root = volume_root_of(&root_path);
        let drive_letter = drive_letter_of(&root_path);
        let label = root_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_path.to_string_lossy().into_owned());
        Self {
            root_path,
            volume_root,
            drive_letter,
            label,
            total_size: 0,
            free_space: 0,
            class,
            health: DriveHealth::Unknown,
            tier: class.tier(),
            last_health_check: Utc::now(),
        }
    }

    /// IO weight of this drive's device class.
    pub fn io_score(&self) -> f64 {
        self.class.io_score()
    }
}

/// Derive the volume root of a path: the drive prefix on Windows-style
/// paths, the filesystem root otherwise.
fn volume_root_of(path: &Path) -> PathBuf {
    if let Some(letter) = drive_letter_of(path) {
        return PathBuf::from(format!("{letter}\\"));
    }
    PathBuf::from(std::path::MAIN_SEPARATOR_STR)
}

/// Extract a Windows-style drive letter (`C:`) from a path, if present.
fn drive_letter_of(path: &Path) -> Option<String> {
    let s = path.to_string_lossy();
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), Some(':')) if c.is_ascii_alphabetic() => {
            Some(format!("{}:", c.to_ascii_uppercase()))
        }
        _ => None,
    }
}

/// A placement rule applied to relative paths.
///
/// Rules are evaluated top-to-bottom; the first whose glob pattern matches
/// the sanitized relative path wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRule {
    /// Glob pattern over the relative path (`*` within a segment,
    /// `**` across segments, case-insensitive).
    pub pattern: String,
    /// Advisory drive constraint: a root path or drive letter.
    pub target_drive: Option<String>,
    /// Required replica count. Minimum 1 (no replication).
    pub duplication_level: u32,
    /// Boost SSD/NVMe drives when placing matching files.
    pub prefer_ssd: bool,
    /// Reject drives for files larger than this, when set.
    pub max_file_size: Option<u64>,
    /// Preferred performance tier, when set.
    pub preferred_tier: Option<DriveTier>,
}

impl PoolRule {
    /// Create a rule matching `pattern` with default settings
    /// (duplication 1, no constraints).
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target_drive: None,
            duplication_level: 1,
            prefer_ssd: false,
            max_file_size: None,
            preferred_tier: None,
        }
    }

    /// Set the required replica count (clamped to at least 1 at use sites).
    pub fn with_duplication(mut self, level: u32) -> Self {
        self.duplication_level = level;
        self
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A logical group of filesystem roots treated as one replicated namespace.
///
/// Pools exist for the process lifetime only; the persisted replica index
/// refers back to them by [`PoolId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePool {
    /// Stable identifier.
    pub id: PoolId,
    /// Human name.
    pub name: String,
    /// Informational flavour.
    pub pool_type: PoolType,
    /// Display-only mount point hint. Nothing is mounted there.
    pub mount_point_hint: String,
    /// Member drives, in insertion order.
    pub drives: Vec<PoolDrive>,
    /// Placement rules, in evaluation order.
    pub rules: Vec<PoolRule>,
    /// Creation time.
    pub created_utc: DateTime<Utc>,
    /// Last mutation time.
    pub updated_utc: DateTime<Utc>,
}

impl StoragePool {
    /// Find a drive by its root path.
    pub fn drive(&self, root: &Path) -> Option<&PoolDrive> {
        self.drives.iter().find(|d| d.root_path == root)
    }

    /// Find a drive by its root path, mutably.
    pub fn drive_mut(&mut self, root: &Path) -> Option<&mut PoolDrive> {
        self.drives.iter_mut().find(|d| d.root_path == root)
    }
}

/// Display-only mount point hint for a pool name.
///
/// `K:\<name>` on Windows hosts, `/pools/<name>` elsewhere.
pub fn mount_point_hint(name: &str) -> String {
    if cfg!(windows) {
        format!("K:\\{name}")
    } else {
        format!("/pools/{name}")
    }
}

// ---------------------------------------------------------------------------
// Replica records
// ---------------------------------------------------------------------------

/// One persisted replica expectation:
/// `(pool_id, rel_path, drive_root)` → `(size, sha256, modified)`.
///
/// The index is advisory — on-disk files are authoritative for content —
/// but it records which replicas the engine intends to exist and what
/// they hashed to when last observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Owning pool.
    pub pool_id: PoolId,
    /// Sanitized relative path.
    pub rel_path: String,
    /// Root path of the drive holding this replica.
    pub drive_root: String,
    /// File size in bytes when last observed.
    pub size_bytes: u64,
    /// Uppercase hex SHA-256 of the content when last observed.
    pub sha256: String,
    /// Last observation time. Stored as an RFC 3339 round-trip string.
    pub modified_utc: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
