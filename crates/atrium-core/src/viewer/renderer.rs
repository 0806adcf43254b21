use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chain::{url_extension, MediaFormat, RenderStrategy};
use crate::models::{ContentItem, ContentKind};

/// The asset a renderer displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaSource {
    pub kind: ContentKind,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl MediaSource {
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            kind: item.kind,
            url: item.file_url.clone(),
            title: item.title.clone(),
            content_type: None,
        }
    }

    /// Download name: the title made filesystem-safe plus the URL's extension.
    pub fn filename(&self) -> String {
        let stem: String = self
            .title
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = if stem.trim().is_empty() {
            self.kind.as_str().to_string()
        } else {
            stem.trim().to_string()
        };
        match url_extension(&self.url) {
            Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
            None => stem,
        }
    }
}

/// Element description produced by a renderer. Renderers never touch the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum RenderOutput {
    /// In-page PDF viewer (pdf.js or a native embed)
    PdfViewer { src: String },
    Video {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        controls: bool,
    },
    Audio {
        src: String,
        controls: bool,
    },
    Iframe {
        src: String,
        allow_fullscreen: bool,
    },
    Download {
        href: String,
        filename: String,
        open_in_new_tab: bool,
    },
}

pub trait MediaRenderer: Send + Sync {
    fn strategy(&self) -> RenderStrategy;

    fn render(&self, source: &MediaSource, format: MediaFormat) -> RenderOutput;
}

/// Native in-page element for the format.
pub struct PrimaryRenderer;

/// Embedded frame that lets the browser's own viewer handle the file.
pub struct SecondaryRenderer;

/// Last resort: a link that opens or downloads the file.
pub struct DownloadPrompt;

impl MediaRenderer for PrimaryRenderer {
    fn strategy(&self) -> RenderStrategy {
        RenderStrategy::Primary
    }

    fn render(&self, source: &MediaSource, format: MediaFormat) -> RenderOutput {
        match format {
            MediaFormat::Pdf => RenderOutput::PdfViewer {
                src: source.url.clone(),
            },
            MediaFormat::Audio => RenderOutput::Audio {
                src: source.url.clone(),
                controls: true,
            },
            MediaFormat::Video { container } => RenderOutput::Video {
                src: source.url.clone(),
                mime_type: source
                    .content_type
                    .clone()
                    .or_else(|| container.mime_type().map(str::to_string)),
                controls: true,
            },
        }
    }
}

impl MediaRenderer for SecondaryRenderer {
    fn strategy(&self) -> RenderStrategy {
        RenderStrategy::Secondary
    }

    fn render(&self, source: &MediaSource, format: MediaFormat) -> RenderOutput {
        RenderOutput::Iframe {
            src: source.url.clone(),
            allow_fullscreen: !matches!(format, MediaFormat::Audio),
        }
    }
}

impl MediaRenderer for DownloadPrompt {
    fn strategy(&self) -> RenderStrategy {
        RenderStrategy::DownloadPrompt
    }

    fn render(&self, source: &MediaSource, _format: MediaFormat) -> RenderOutput {
        RenderOutput::Download {
            href: source.url.clone(),
            filename: source.filename(),
            open_in_new_tab: true,
        }
    }
}

pub fn renderer_for(strategy: RenderStrategy) -> &'static dyn MediaRenderer {
    match strategy {
        RenderStrategy::Primary => &PrimaryRenderer,
        RenderStrategy::Secondary => &SecondaryRenderer,
        RenderStrategy::DownloadPrompt => &DownloadPrompt,
    }
}
