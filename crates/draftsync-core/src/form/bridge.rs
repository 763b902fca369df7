//! Pure projections between form values and draft payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use draftsync_types::draft::{
    Draft, DraftKey, DraftPayload, METADATA_BOARD_ID, METADATA_CATEGORY,
};

use super::{FormPatch, FormValues};

/// Which form fields feed which payload parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub title: String,
    pub content: String,
    /// Form fields copied into the payload metadata under the same name.
    pub metadata: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            title: "title".to_string(),
            content: "content".to_string(),
            metadata: vec![METADATA_CATEGORY.to_string()],
        }
    }
}

/// Maps one editor form to the draft stored under `key`.
#[derive(Debug, Clone)]
pub struct FormStateBridge {
    mapping: FieldMapping,
    key: DraftKey,
}

impl FormStateBridge {
    pub fn new(key: DraftKey, mapping: FieldMapping) -> Self {
        Self { mapping, key }
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    /// Project form values to a payload. Always total: missing or non-text
    /// title/content become empty strings.
    pub fn to_payload(&self, values: &FormValues) -> DraftPayload {
        let mut metadata = Map::new();
        for field in &self.mapping.metadata {
            if let Some(value) = values.get(field).filter(|v| !v.is_null()) {
                metadata.insert(field.clone(), value.clone());
            }
        }
        metadata.insert(
            METADATA_BOARD_ID.to_string(),
            Value::String(self.key.board_id.to_string()),
        );

        DraftPayload {
            title: text(values, &self.mapping.title),
            content: text(values, &self.mapping.content),
            metadata,
            post_id: self.key.post_id.clone(),
        }
    }

    /// Patch carrying every field the snapshot provides that differs from
    /// the current form value.
    pub fn to_patch(&self, draft: &Draft, current: &FormValues) -> FormPatch {
        let mut patch = FormPatch::default();
        for (field, value) in self.provided_fields(draft) {
            if current.get(&field) != Some(&value) {
                patch.set(field, value);
            }
        }
        patch
    }

    /// Like [`to_patch`](Self::to_patch), but leaves alone any field whose
    /// current value already diverged from `baseline` (the value at mount).
    pub fn hydration_patch(
        &self,
        draft: &Draft,
        current: &FormValues,
        baseline: &FormValues,
    ) -> FormPatch {
        let mut patch = self.to_patch(draft, current);
        patch
            .0
            .retain(|field, _| current.get(field) == baseline.get(field));
        patch
    }

    fn provided_fields(&self, draft: &Draft) -> Vec<(String, Value)> {
        let mut fields = Vec::new();
        if let Some(title) = &draft.title {
            fields.push((self.mapping.title.clone(), Value::String(title.clone())));
        }
        if let Some(content) = &draft.content {
            fields.push((self.mapping.content.clone(), Value::String(content.clone())));
        }
        for field in &self.mapping.metadata {
            if let Some(value) = draft.metadata.get(field).filter(|v| !v.is_null()) {
                fields.push((field.clone(), value.clone()));
            }
        }
        fields
    }
}

fn text(values: &FormValues, field: &str) -> String {
    values
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use draftsync_types::draft::{BoardId, DraftId, PostId, VersionToken};
    use draftsync_types::identity::UserId;
    use serde_json::json;

    fn bridge() -> FormStateBridge {
        FormStateBridge::new(
            DraftKey::existing_post(BoardId::new("news"), PostId::new("7")),
            FieldMapping::default(),
        )
    }

    fn values(pairs: &[(&str, Value)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn remote(title: Option<&str>, content: Option<&str>, category: Option<&str>) -> Draft {
        let now = Utc::now();
        let mut metadata = Map::new();
        if let Some(category) = category {
            metadata.insert("category".to_string(), json!(category));
        }
        Draft {
            id: DraftId::new(),
            owner: UserId::new("1"),
            board_id: BoardId::new("news"),
            post_id: Some(PostId::new("7")),
            title: title.map(str::to_string),
            content: content.map(str::to_string),
            metadata,
            version: VersionToken(2),
            conflict: None,
            created_at: now,
            updated_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn payload_is_total_and_tagged_with_board_and_post() {
        let payload = bridge().to_payload(&values(&[("category", json!("tech"))]));
        assert_eq!(payload.title, "");
        assert_eq!(payload.content, "");
        assert_eq!(payload.metadata["boardId"], json!("news"));
        assert_eq!(payload.metadata["category"], json!("tech"));
        assert_eq!(payload.post_id, Some(PostId::new("7")));
    }

    #[test]
    fn unmapped_fields_stay_out_of_payload() {
        let payload = bridge().to_payload(&values(&[("attachments", json!([1, 2]))]));
        assert!(!payload.metadata.contains_key("attachments"));
    }

    #[test]
    fn patch_only_has_provided_and_changed_fields() {
        let current = values(&[("title", json!("Same")), ("content", json!("Local"))]);
        let patch = bridge().to_patch(&remote(Some("Same"), None, Some("news")), &current);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("category"), Some(&json!("news")));
    }

    #[test]
    fn hydration_skips_fields_the_user_already_edited() {
        let baseline = values(&[("title", json!("")), ("content", json!(""))]);
        let current = values(&[("title", json!("Typed")), ("content", json!(""))]);
        let patch = bridge().hydration_patch(
            &remote(Some("Saved title"), Some("Saved body"), None),
            &current,
            &baseline,
        );
        assert_eq!(patch.get("title"), None);
        assert_eq!(patch.get("content"), Some(&json!("Saved body")));
    }
}
