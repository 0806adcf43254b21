use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// The three kinds of deliverable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "content_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Audio,
    Pdf,
    Video,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Audio, ContentKind::Pdf, ContentKind::Video];

    /// Collection segment used in REST paths (`/api/audio`, `/api/pdfs`, `/api/videos`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            ContentKind::Audio => "audio",
            ContentKind::Pdf => "pdfs",
            ContentKind::Video => "videos",
        }
    }

    /// Singular name, also the prefix of recovery keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Audio => "audio",
            ContentKind::Pdf => "pdf",
            ContentKind::Video => "video",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Audio => "Audio",
            ContentKind::Pdf => "PDF",
            ContentKind::Video => "Video",
        }
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio" | "audios" => Ok(ContentKind::Audio),
            "pdf" | "pdfs" => Ok(ContentKind::Pdf),
            "video" | "videos" => Ok(ContentKind::Video),
            _ => Err(anyhow::anyhow!("Unknown content kind: {}", s)),
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Title is required".into());
        return Err(err);
    }
    Ok(())
}

/// One uploaded asset attached to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ContentItem {
    pub id: i64,
    pub kind: ContentKind,
    pub title: String,
    pub file_url: String,
    /// Only PDFs carry a cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    pub category_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Phase-two metadata write after the file itself is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateContentRequest {
    #[validate(
        length(min = 1, max = 255, message = "Title is required"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[validate(length(min = 1, max = 2048, message = "File URL is required"))]
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 2048))]
    pub cover_url: Option<String>,
    #[validate(range(min = 1, message = "A category must be selected"))]
    pub category_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateContentRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 2048))]
    pub file_url: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 2048))]
    pub cover_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams)]
pub struct ContentQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Restrict to one category
    #[serde(default)]
    pub category_id: Option<i64>,
}

impl ContentQuery {
    pub fn pagination(&self) -> crate::Pagination {
        crate::Pagination::new(self.page, self.limit)
    }
}

/// Result of phase one: the object is stored but not yet referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub file_url: String,
    pub storage_key: String,
    pub content_type: String,
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("pdfs".parse::<ContentKind>().unwrap(), ContentKind::Pdf);
        assert_eq!("Video".parse::<ContentKind>().unwrap(), ContentKind::Video);
        assert_eq!("audio".parse::<ContentKind>().unwrap(), ContentKind::Audio);
        assert!("image".parse::<ContentKind>().is_err());
    }

    #[test]
    fn path_segments_and_prefixes() {
        assert_eq!(ContentKind::Pdf.path_segment(), "pdfs");
        assert_eq!(ContentKind::Pdf.as_str(), "pdf");
        assert_eq!(ContentKind::Audio.path_segment(), "audio");
        assert_eq!(ContentKind::Video.to_string(), "video");
    }

    #[test]
    fn create_request_requires_title_and_category() {
        let req = CreateContentRequest {
            title: String::new(),
            file_url: "https://cdn/x.mp3".to_string(),
            cover_url: None,
            category_id: 0,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("category_id"));
    }

    #[test]
    fn whitespace_titles_are_rejected() {
        let create = CreateContentRequest {
            title: "   ".to_string(),
            file_url: "https://cdn/x.mp3".to_string(),
            cover_url: None,
            category_id: 1,
        };
        assert!(create.validate().unwrap_err().field_errors().contains_key("title"));

        let update = UpdateContentRequest {
            title: Some("\t\n".to_string()),
            ..Default::default()
        };
        assert!(update.validate().unwrap_err().field_errors().contains_key("title"));

        let untouched = UpdateContentRequest::default();
        assert!(untouched.validate().is_ok());
    }
}
