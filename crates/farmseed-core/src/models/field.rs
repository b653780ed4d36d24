//! Field model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{monotonic_now, Coordinates, RecordId};

/// A named geographic area seeds are planted in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: RecordId,
    pub name: String,
    /// Single representative point for the field
    pub coordinates: Coordinates,
    pub acreage: String,
    pub crop_type: String,
    pub notes: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-provided fields for a new field record
#[derive(Debug, Clone, Default)]
pub struct FieldDraft {
    pub name: String,
    pub coordinates: Coordinates,
    pub acreage: String,
    pub crop_type: String,
    pub notes: String,
    pub color: String,
}

/// Partial update for a field; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub acreage: Option<String>,
    pub crop_type: Option<String>,
    pub notes: Option<String>,
    pub color: Option<String>,
}

impl Field {
    /// Create a new field from a draft
    #[must_use]
    pub fn new(draft: FieldDraft) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            name: draft.name,
            coordinates: draft.coordinates,
            acreage: draft.acreage,
            crop_type: draft.crop_type,
            notes: draft.notes,
            color: draft.color,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`
    pub fn apply(&mut self, patch: FieldPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(coordinates) = patch.coordinates {
            self.coordinates = coordinates;
        }
        if let Some(acreage) = patch.acreage {
            self.acreage = acreage;
        }
        if let Some(crop_type) = patch.crop_type {
            self.crop_type = crop_type;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        self.updated_at = monotonic_now(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch_keeps_identity() {
        let mut field = Field::new(FieldDraft {
            name: "South 80".to_string(),
            ..FieldDraft::default()
        });
        let id = field.id;
        field.apply(FieldPatch {
            crop_type: Some("Corn".to_string()),
            ..FieldPatch::default()
        });
        assert_eq!(field.id, id);
        assert_eq!(field.crop_type, "Corn");
        assert_eq!(field.name, "South 80");
    }
}
