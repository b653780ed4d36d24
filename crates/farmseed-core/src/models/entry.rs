//! Seed entry model

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{monotonic_now, RecordId};

/// A GPS point captured with a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A planting observation recorded in the field
///
/// `field_name` is a denormalized display string, not a foreign key; entries
/// survive the deletion of the field they name. Wire format is camelCase to
/// stay row-compatible across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedEntry {
    pub id: RecordId,
    pub photos: Vec<String>,
    pub coordinates: Coordinates,
    pub producer: String,
    pub variety_name: String,
    pub lot_number: String,
    pub planting_date: String,
    pub rate: String,
    pub traits: Vec<String>,
    pub treatments: Vec<String>,
    pub germination_percent: String,
    pub notes: String,
    pub field_name: String,
    pub map_label: String,
    /// Date the entry was captured (stamped at creation; absent on rows from
    /// older app versions)
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    /// Time the entry was captured (stamped at creation; absent on rows from
    /// older app versions)
    #[serde(default)]
    pub entry_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-provided fields for a new entry
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub photos: Vec<String>,
    pub coordinates: Coordinates,
    pub producer: String,
    pub variety_name: String,
    pub lot_number: String,
    pub planting_date: String,
    pub rate: String,
    pub traits: Vec<String>,
    pub treatments: Vec<String>,
    pub germination_percent: String,
    pub notes: String,
    pub field_name: String,
    pub map_label: String,
}

/// Partial update for an entry; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub photos: Option<Vec<String>>,
    pub coordinates: Option<Coordinates>,
    pub producer: Option<String>,
    pub variety_name: Option<String>,
    pub lot_number: Option<String>,
    pub planting_date: Option<String>,
    pub rate: Option<String>,
    pub traits: Option<Vec<String>>,
    pub treatments: Option<Vec<String>>,
    pub germination_percent: Option<String>,
    pub notes: Option<String>,
    pub field_name: Option<String>,
    pub map_label: Option<String>,
}

impl SeedEntry {
    /// Create a new entry from a draft, stamping id, capture date/time, and
    /// timestamps
    #[must_use]
    pub fn new(draft: EntryDraft) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            photos: draft.photos,
            coordinates: draft.coordinates,
            producer: draft.producer,
            variety_name: draft.variety_name,
            lot_number: draft.lot_number,
            planting_date: draft.planting_date,
            rate: draft.rate,
            traits: draft.traits,
            treatments: draft.treatments,
            germination_percent: draft.germination_percent,
            notes: draft.notes,
            field_name: draft.field_name,
            map_label: draft.map_label,
            entry_date: Some(now.date_naive()),
            entry_time: Some(now.time()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`
    pub fn apply(&mut self, patch: EntryPatch) {
        if let Some(photos) = patch.photos {
            self.photos = photos;
        }
        if let Some(coordinates) = patch.coordinates {
            self.coordinates = coordinates;
        }
        if let Some(producer) = patch.producer {
            self.producer = producer;
        }
        if let Some(variety_name) = patch.variety_name {
            self.variety_name = variety_name;
        }
        if let Some(lot_number) = patch.lot_number {
            self.lot_number = lot_number;
        }
        if let Some(planting_date) = patch.planting_date {
            self.planting_date = planting_date;
        }
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(traits) = patch.traits {
            self.traits = traits;
        }
        if let Some(treatments) = patch.treatments {
            self.treatments = treatments;
        }
        if let Some(germination_percent) = patch.germination_percent {
            self.germination_percent = germination_percent;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(field_name) = patch.field_name {
            self.field_name = field_name;
        }
        if let Some(map_label) = patch.map_label {
            self.map_label = map_label;
        }
        self.updated_at = monotonic_now(self.updated_at);
    }

    /// Case-insensitive match against variety, producer, field name, or map
    /// label
    #[must_use]
    pub fn matches_search(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        self.variety_name.to_lowercase().contains(&lower)
            || self.producer.to_lowercase().contains(&lower)
            || self.field_name.to_lowercase().contains(&lower)
            || self.map_label.to_lowercase().contains(&lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EntryDraft {
        EntryDraft {
            producer: "Pioneer".to_string(),
            variety_name: "P1197".to_string(),
            lot_number: "LOT-42".to_string(),
            field_name: "North 40".to_string(),
            ..EntryDraft::default()
        }
    }

    #[test]
    fn test_new_entry_stamps_identity_and_times() {
        let entry = SeedEntry::new(draft());
        assert_eq!(entry.created_at, entry.updated_at);
        assert!(entry.entry_date.is_some());
        assert!(entry.entry_time.is_some());
    }

    #[test]
    fn test_apply_patch_bumps_updated_at() {
        let mut entry = SeedEntry::new(draft());
        let before = entry.updated_at;
        entry.apply(EntryPatch {
            notes: Some("replanted".to_string()),
            ..EntryPatch::default()
        });
        assert_eq!(entry.notes, "replanted");
        assert!(entry.updated_at >= before);
        // Untouched fields survive
        assert_eq!(entry.variety_name, "P1197");
    }

    #[test]
    fn test_matches_search_is_case_insensitive() {
        let entry = SeedEntry::new(draft());
        assert!(entry.matches_search("p1197"));
        assert!(entry.matches_search("north"));
        assert!(!entry.matches_search("soybean"));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let entry = SeedEntry::new(draft());
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("varietyName").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("variety_name").is_none());
    }

    #[test]
    fn test_decodes_rows_without_capture_stamps() {
        let mut value = serde_json::to_value(SeedEntry::new(draft())).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("entryDate");
        obj.remove("entryTime");
        let decoded: SeedEntry = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.entry_date, None);
        assert_eq!(decoded.entry_time, None);
    }
}
