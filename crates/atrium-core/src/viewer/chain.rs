use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::device::{Browser, DeviceProfile};
use crate::models::ContentKind;

/// Display technique, ordered from preferred to last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    Primary,
    Secondary,
    DownloadPrompt,
}

impl RenderStrategy {
    pub fn next(self) -> Option<Self> {
        match self {
            RenderStrategy::Primary => Some(RenderStrategy::Secondary),
            RenderStrategy::Secondary => Some(RenderStrategy::DownloadPrompt),
            RenderStrategy::DownloadPrompt => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Mp4,
    Webm,
    Mkv,
    Ogg,
    Mov,
    Other,
}

impl VideoContainer {
    fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" | "m4v" => VideoContainer::Mp4,
            "webm" => VideoContainer::Webm,
            "mkv" => VideoContainer::Mkv,
            "ogg" | "ogv" => VideoContainer::Ogg,
            "mov" => VideoContainer::Mov,
            _ => VideoContainer::Other,
        }
    }

    fn from_content_type(content_type: &str) -> Self {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "video/mp4" | "video/x-m4v" => VideoContainer::Mp4,
            "video/webm" => VideoContainer::Webm,
            "video/x-matroska" => VideoContainer::Mkv,
            "video/ogg" => VideoContainer::Ogg,
            "video/quicktime" => VideoContainer::Mov,
            _ => VideoContainer::Other,
        }
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            VideoContainer::Mp4 => Some("video/mp4"),
            VideoContainer::Webm => Some("video/webm"),
            VideoContainer::Mkv => Some("video/x-matroska"),
            VideoContainer::Ogg => Some("video/ogg"),
            VideoContainer::Mov => Some("video/quicktime"),
            VideoContainer::Other => None,
        }
    }
}

/// What is being displayed, as far as strategy selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaFormat {
    Pdf,
    Audio,
    Video { container: VideoContainer },
}

impl MediaFormat {
    /// Detect the format from the content kind, preferring an explicit content
    /// type over the URL extension for video containers.
    pub fn detect(kind: ContentKind, url: &str, content_type: Option<&str>) -> Self {
        match kind {
            ContentKind::Pdf => MediaFormat::Pdf,
            ContentKind::Audio => MediaFormat::Audio,
            ContentKind::Video => {
                let from_type = content_type
                    .map(VideoContainer::from_content_type)
                    .filter(|c| *c != VideoContainer::Other);
                let container = from_type.unwrap_or_else(|| {
                    url_extension(url)
                        .map(VideoContainer::from_extension)
                        .unwrap_or(VideoContainer::Other)
                });
                MediaFormat::Video { container }
            }
        }
    }
}

/// File extension of the URL path as written, ignoring query and fragment.
pub(crate) fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

fn natively_playable(container: VideoContainer, browser: Browser) -> bool {
    !matches!(
        (browser, container),
        (Browser::Safari, VideoContainer::Webm | VideoContainer::Mkv | VideoContainer::Ogg)
            | (Browser::Firefox, VideoContainer::Mov | VideoContainer::Mkv)
    )
}

/// Strategy to try first for a given format on a given device.
pub fn initial_strategy(format: MediaFormat, device: &DeviceProfile) -> RenderStrategy {
    match format {
        MediaFormat::Pdf if device.mobile => RenderStrategy::Secondary,
        MediaFormat::Pdf | MediaFormat::Audio => RenderStrategy::Primary,
        MediaFormat::Video { container } => {
            if natively_playable(container, device.browser) {
                RenderStrategy::Primary
            } else {
                RenderStrategy::Secondary
            }
        }
    }
}

/// Failure reported by the active renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{strategy:?} renderer failed to load: {reason}")]
pub struct LoadError {
    pub strategy: RenderStrategy,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transition {
    pub from: RenderStrategy,
    pub to: RenderStrategy,
    pub reason: String,
}

/// One-directional fallback state machine.
///
/// Each load error moves exactly one step towards `DownloadPrompt`; the
/// terminal state absorbs further errors without transitioning.
#[derive(Debug, Clone)]
pub struct RenderChain {
    format: MediaFormat,
    current: RenderStrategy,
    transitions: Vec<Transition>,
}

impl RenderChain {
    pub fn new(format: MediaFormat, device: &DeviceProfile) -> Self {
        Self::starting_at(format, initial_strategy(format, device))
    }

    pub fn starting_at(format: MediaFormat, strategy: RenderStrategy) -> Self {
        Self {
            format,
            current: strategy,
            transitions: Vec::new(),
        }
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn current(&self) -> RenderStrategy {
        self.current
    }

    pub fn is_exhausted(&self) -> bool {
        self.current == RenderStrategy::DownloadPrompt
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Strategies still available, starting with the current one.
    pub fn remaining(&self) -> Vec<RenderStrategy> {
        std::iter::successors(Some(self.current), |s| s.next()).collect()
    }

    pub fn on_load_error(&mut self, error: LoadError) -> Option<Transition> {
        let next = self.current.next()?;
        tracing::debug!(
            from = ?self.current,
            to = ?next,
            reason = %error.reason,
            "Renderer failed, falling back"
        );
        let transition = Transition {
            from: self.current,
            to: next,
            reason: error.reason,
        };
        self.current = next;
        self.transitions.push(transition.clone());
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(chain: &RenderChain) -> LoadError {
        LoadError {
            strategy: chain.current(),
            reason: "load failed".to_string(),
        }
    }

    #[test]
    fn pdf_chain_degrades_one_step_at_a_time() {
        let mut chain = RenderChain::new(MediaFormat::Pdf, &DeviceProfile::desktop());
        assert_eq!(chain.current(), RenderStrategy::Primary);

        let t = chain.on_load_error(error(&chain)).unwrap();
        assert_eq!((t.from, t.to), (RenderStrategy::Primary, RenderStrategy::Secondary));

        let t = chain.on_load_error(error(&chain)).unwrap();
        assert_eq!(
            (t.from, t.to),
            (RenderStrategy::Secondary, RenderStrategy::DownloadPrompt)
        );

        assert!(chain.on_load_error(error(&chain)).is_none());
        assert!(chain.on_load_error(error(&chain)).is_none());
        assert_eq!(chain.current(), RenderStrategy::DownloadPrompt);
        assert_eq!(chain.transitions().len(), 2);
    }

    #[test]
    fn mobile_pdf_starts_at_secondary() {
        let mobile = DeviceProfile {
            mobile: true,
            browser: Browser::Safari,
        };
        let chain = RenderChain::new(MediaFormat::Pdf, &mobile);
        assert_eq!(chain.current(), RenderStrategy::Secondary);
        assert_eq!(
            chain.remaining(),
            vec![RenderStrategy::Secondary, RenderStrategy::DownloadPrompt]
        );
    }

    #[test]
    fn video_strategy_depends_on_container_support() {
        let safari = DeviceProfile {
            mobile: false,
            browser: Browser::Safari,
        };
        let firefox = DeviceProfile {
            mobile: false,
            browser: Browser::Firefox,
        };
        let webm = MediaFormat::Video {
            container: VideoContainer::Webm,
        };
        let mov = MediaFormat::Video {
            container: VideoContainer::Mov,
        };
        assert_eq!(initial_strategy(webm, &safari), RenderStrategy::Secondary);
        assert_eq!(initial_strategy(webm, &firefox), RenderStrategy::Primary);
        assert_eq!(initial_strategy(mov, &firefox), RenderStrategy::Secondary);
        assert_eq!(initial_strategy(mov, &safari), RenderStrategy::Primary);
    }

    #[test]
    fn detect_prefers_content_type() {
        let format = MediaFormat::detect(
            ContentKind::Video,
            "https://cdn/clip.mp4?sig=abc",
            Some("video/webm"),
        );
        assert_eq!(
            format,
            MediaFormat::Video {
                container: VideoContainer::Webm
            }
        );

        let format = MediaFormat::detect(ContentKind::Video, "https://cdn/clip.MKV#t=3", None);
        assert_eq!(
            format,
            MediaFormat::Video {
                container: VideoContainer::Mkv
            }
        );
    }

    #[test]
    fn url_extension_ignores_query_and_dotfiles() {
        assert_eq!(url_extension("https://x/y.mp3?a=b"), Some("mp3"));
        assert_eq!(url_extension("https://x/.hidden"), None);
        assert_eq!(url_extension("https://x/Y.PDF#page=2"), Some("PDF"));
        assert_eq!(url_extension("https://x/noext"), None);
    }
}
