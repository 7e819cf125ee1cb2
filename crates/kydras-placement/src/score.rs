//! Weighted drive scheduling.
//!
//! Filtering and scoring follow fixed weights: free-space ratio carries
//! 0.45, normalized IO class 0.35, health 0.10. The base weights sum to
//! 0.90; the tier and SSD multipliers cover the remainder of the
//! dynamic range.

use kydras_types::{DriveClass, DriveHealth, DriveTier, PoolDrive, PoolRule};
use tracing::trace;

/// Score a single drive for a rule. Pure; shared by the write scheduler
/// and the rebalancer's eviction ranking.
pub fn score_drive(drive: &PoolDrive, rule: Option<&PoolRule>) -> f64 {
    let space_ratio = if drive.total_size > 0 {
        drive.free_space as f64 / drive.total_size as f64
    } else {
        0.5
    };
    let io_norm = drive.io_score() / 3.0;
    let health_w = match drive.health {
        DriveHealth::Healthy => 1.0,
        DriveHealth::Warning => 0.6,
        DriveHealth::Critical => 0.2,
        _ => 0.5,
    };

    let base = 0.45 * space_ratio + 0.35 * io_norm + 0.10 * health_w;

    let tier_mult = match rule.and_then(|r| r.preferred_tier) {
        None => 1.0,
        Some(pref) if drive.tier == pref => 1.2,
        // Graceful downshift: Hot-preferring files still sit well on Warm.
        Some(DriveTier::Hot) if drive.tier == DriveTier::Warm => 1.0,
        Some(_) => 0.8,
    };

    let prefer_ssd = rule.is_some_and(|r| r.prefer_ssd);
    let ssd_mult = if prefer_ssd && matches!(drive.class, DriveClass::Ssd | DriveClass::Nvme) {
        1.1
    } else {
        1.0
    };

    base * tier_mult * ssd_mult
}

/// Filter a drive set down to the drives eligible to hold a file of
/// `size` bytes under `rule`.
///
/// In order: healthy only; enough free space (`free == 0` means unknown
/// and passes, otherwise `free > size`); the rule's advisory target
/// drive (falling back to the unfiltered set when nothing matches); the
/// rule's maximum file size.
pub fn eligible_drives<'a>(
    drives: &'a [PoolDrive],
    rule: Option<&PoolRule>,
    size: u64,
) -> Vec<&'a PoolDrive> {
    let mut fit: Vec<&PoolDrive> = drives
        .iter()
        .filter(|d| d.health == DriveHealth::Healthy)
        .filter(|d| d.free_space == 0 || d.free_space > size)
        .collect();

    if let Some(target) = rule.and_then(|r| r.target_drive.as_deref()) {
        let targeted: Vec<&PoolDrive> = fit
            .iter()
            .copied()
            .filter(|d| matches_target(d, target))
            .collect();
        // The target is advisory: keep the wider set when it names no drive.
        if !targeted.is_empty() {
            fit = targeted;
        } else {
            trace!(target, "rule target matches no eligible drive, ignoring");
        }
    }

    if let Some(max) = rule.and_then(|r| r.max_file_size) {
        if max > 0 && size > max {
            return Vec::new();
        }
    }

    fit
}

/// Rank the eligible drives for a file, best first.
///
/// Stable descending sort on [`score_drive`]; ties keep insertion order.
pub fn rank_drives<'a>(
    drives: &'a [PoolDrive],
    rule: Option<&PoolRule>,
    size: u64,
) -> Vec<&'a PoolDrive> {
    let mut eligible = eligible_drives(drives, rule, size);
    eligible.sort_by(|a, b| score_drive(b, rule).total_cmp(&score_drive(a, rule)));
    eligible
}

/// Case-insensitive match of a rule's target against a drive's root path
/// or drive letter.
fn matches_target(drive: &PoolDrive, target: &str) -> bool {
    let root = drive.root_path.to_string_lossy();
    if root.eq_ignore_ascii_case(target) {
        return true;
    }
    drive
        .drive_letter
        .as_deref()
        .is_some_and(|l| l.eq_ignore_ascii_case(target) || l.eq_ignore_ascii_case(target.trim_end_matches(['\\', '/'])))
}
