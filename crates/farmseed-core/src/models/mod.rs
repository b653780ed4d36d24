//! Data models for Farmseed

use chrono::{DateTime, Utc};

mod entry;
mod farm;
mod field;
mod id;
mod inventory;

pub use entry::{Coordinates, EntryDraft, EntryPatch, SeedEntry};
pub use farm::{Farm, FarmMember, NewMember};
pub use field::{Field, FieldDraft, FieldPatch};
pub use id::RecordId;
pub use inventory::{
    InventoryItem, InventoryItemDraft, InventoryItemPatch, InventoryUnit, InventoryUsage,
};

/// Current time, clamped so a record's `updated_at` never decreases even if
/// the wall clock steps backwards between mutations
#[must_use]
pub fn monotonic_now(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monotonic_now_never_goes_backwards() {
        let future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(monotonic_now(future), future);

        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(monotonic_now(past) > past);
    }
}
