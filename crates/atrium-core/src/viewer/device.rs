use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Edge,
    Firefox,
    Safari,
    Other,
}

/// Coarse client classification derived from a `User-Agent` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceProfile {
    pub mobile: bool,
    pub browser: Browser,
}

const MOBILE_MARKERS: [&str; 4] = ["Mobi", "Android", "iPhone", "iPad"];
const EDGE_MARKERS: [&str; 4] = ["Edg/", "Edge/", "EdgA/", "EdgiOS/"];
const FIREFOX_MARKERS: [&str; 2] = ["Firefox/", "FxiOS/"];
const CHROME_MARKERS: [&str; 2] = ["Chrome/", "CriOS/"];

impl DeviceProfile {
    pub fn desktop() -> Self {
        Self {
            mobile: false,
            browser: Browser::Other,
        }
    }

    pub fn from_user_agent(user_agent: &str) -> Self {
        let has = |markers: &[&str]| markers.iter().any(|m| user_agent.contains(m));

        // Edge and most iOS browsers also advertise Chrome/Safari tokens.
        let browser = if has(&EDGE_MARKERS) {
            Browser::Edge
        } else if has(&FIREFOX_MARKERS) {
            Browser::Firefox
        } else if has(&CHROME_MARKERS) {
            Browser::Chrome
        } else if user_agent.contains("Safari/") {
            Browser::Safari
        } else {
            Browser::Other
        };

        Self {
            mobile: has(&MOBILE_MARKERS),
            browser,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::desktop()
    }
}
