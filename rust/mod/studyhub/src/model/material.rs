use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_docdb::{DocError, Document};

use super::Category;

/// An uploaded study resource, stored at `materials/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Document id. Not part of the stored body.
    #[serde(skip)]
    pub id: String,
    /// Display name chosen by the uploader.
    pub file_name: String,
    pub category: Category,
    #[serde(rename = "fileURL")]
    pub file_url: String,
    pub class: String,
    /// Uploader's display name at upload time.
    pub uploaded_by: String,
    #[serde(rename = "uploaderUID")]
    pub uploader_id: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub upload_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl Material {
    pub fn from_document(doc: &Document) -> Result<Self, DocError> {
        let mut material: Material = doc.decode()?;
        material.id = doc.id.clone();
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_record() {
        let doc = Document::new(
            "m1",
            json!({
                "fileName": "notes.pdf",
                "category": "Lab Manual",
                "fileURL": "blob://studyhub/materials/A/1_notes.pdf",
                "class": "A",
                "uploadedBy": "Asha",
                "uploaderUID": "u1",
                "uploadDate": 1_700_000_000_000_000i64,
            }),
        );
        let m = Material::from_document(&doc).unwrap();
        assert_eq!(m.id, "m1");
        assert_eq!(m.category, Category::LabManual);
        assert_eq!(m.file_size, None);
    }

    #[test]
    fn unknown_category_is_malformed() {
        let doc = Document::new(
            "m1",
            json!({
                "fileName": "x", "category": "Slides", "fileURL": "u", "class": "A",
                "uploadedBy": "A", "uploaderUID": "u1", "uploadDate": 1,
            }),
        );
        assert!(Material::from_document(&doc).is_err());
    }
}
