//! Count-based retention: keep the N most recently modified backups.
//!
//! Selection ([`objects_to_delete`]) is pure; [`apply_retention`] performs
//! the listing and the deletes against a connected [`StorageClient`].

use std::cmp::Ordering;

use log::info;
use thiserror::Error;

use crate::storage::{DeleteError, ListError, ObjectDescriptor, StorageClient};

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("S3 retention failed while listing backups: {0}")]
    List(#[from] ListError),

    #[error("S3 retention failed while deleting old backups: {0}")]
    Delete(#[from] DeleteError),
}

/// Objects to delete so that only the `keep` newest remain.
///
/// Ordering is newest `last_modified` first, ties broken by key ascending, so
/// the result is deterministic for identical timestamps. `None` or `Some(0)`
/// disables pruning. The returned objects are in that same order.
pub fn objects_to_delete(mut all_objects: Vec<ObjectDescriptor>, keep: Option<u32>) -> Vec<ObjectDescriptor> {
    let keep = match keep {
        Some(k) if k > 0 => k as usize,
        _ => return Vec::new(),
    };

    all_objects.sort_by(newest_first);

    if all_objects.len() <= keep {
        return Vec::new();
    }
    all_objects.split_off(keep)
}

fn newest_first(a: &ObjectDescriptor, b: &ObjectDescriptor) -> Ordering {
    b.last_modified
        .cmp(&a.last_modified)
        .then_with(|| a.key.cmp(&b.key))
}

/// List the namespace, pick the surplus objects and delete them one by one.
///
/// Returns the deleted keys. The first failed delete stops the loop; objects
/// after it are left in place.
pub fn apply_retention(storage: &StorageClient, keep: Option<u32>) -> Result<Vec<String>, RetentionError> {
    let retention_points = match keep {
        Some(k) if k > 0 => k,
        _ => {
            info!("No retention policy configured, skipping cleanup.");
            return Ok(Vec::new());
        }
    };

    info!(
        "Applying retention policy: keeping the latest {} backup(s)",
        retention_points
    );

    let backups = storage.list_by_prefix()?;
    if backups.is_empty() {
        info!("No backups found in bucket, skipping cleanup.");
        return Ok(Vec::new());
    }

    let mut deleted = Vec::new();
    for backup in objects_to_delete(backups, keep) {
        info!(
            "Deleting old backup: {} (last modified {})",
            backup.key,
            backup.last_modified.to_rfc3339()
        );
        storage.delete(&backup.key)?;
        deleted.push(backup.key);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn object(key: &str, day: u32) -> ObjectDescriptor {
        ObjectDescriptor {
            key: key.to_string(),
            last_modified: Utc.with_ymd_and_hms(2025, 4, day, 3, 0, 0).unwrap(),
        }
    }

    fn keys(objects: &[ObjectDescriptor]) -> Vec<&str> {
        objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn test_keep_two_of_three() {
        let all = vec![
            object("routeros-2025-04-19.backup", 19),
            object("routeros-2025-04-20.backup", 20),
            object("routeros-2025-04-21.backup", 21),
        ];

        let doomed = objects_to_delete(all, Some(2));
        assert_eq!(keys(&doomed), vec!["routeros-2025-04-19.backup"]);
    }

    #[test]
    fn test_unset_or_zero_keeps_everything() {
        let all = vec![object("a", 19), object("b", 20)];
        assert!(objects_to_delete(all.clone(), None).is_empty());
        assert!(objects_to_delete(all, Some(0)).is_empty());
    }

    #[test]
    fn test_keep_more_than_stored() {
        let all = vec![object("a", 19), object("b", 20)];
        assert!(objects_to_delete(all, Some(5)).is_empty());
    }

    #[test]
    fn test_input_order_irrelevant() {
        let all = vec![object("c", 21), object("a", 19), object("b", 20), object("d", 18)];
        let doomed = objects_to_delete(all, Some(1));
        assert_eq!(keys(&doomed), vec!["b", "a", "d"]);
    }

    #[test]
    fn test_ties_broken_by_key() {
        let all = vec![object("z", 20), object("m", 20), object("a", 20)];
        let doomed = objects_to_delete(all, Some(1));
        assert_eq!(keys(&doomed), vec!["m", "z"]);
    }
}
