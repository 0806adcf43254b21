//! Media viewer: device detection, the render fallback chain and the
//! renderers that describe what to show at each step.

mod chain;
mod device;
mod renderer;
mod transform;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use chain::{
    initial_strategy, LoadError, MediaFormat, RenderChain, RenderStrategy, Transition,
    VideoContainer,
};
pub use device::{Browser, DeviceProfile};
pub use renderer::{
    renderer_for, DownloadPrompt, MediaRenderer, MediaSource, PrimaryRenderer, RenderOutput,
    SecondaryRenderer,
};
pub use transform::ViewerTransform;

/// Everything a client needs to display one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ViewerPlan {
    pub source: MediaSource,
    pub format: MediaFormat,
    pub device: DeviceProfile,
    pub initial: RenderStrategy,
    pub current: RenderStrategy,
    /// Render outputs from the current strategy down to the download prompt
    pub outputs: Vec<RenderOutput>,
    pub transitions: Vec<Transition>,
    pub transform: ViewerTransform,
}

/// Build a plan for `source`, replaying `reported_errors` load failures
/// through the chain.
pub fn plan(
    source: MediaSource,
    user_agent: &str,
    reported_errors: u32,
    transform: ViewerTransform,
) -> ViewerPlan {
    let device = DeviceProfile::from_user_agent(user_agent);
    let format = MediaFormat::detect(source.kind, &source.url, source.content_type.as_deref());
    let mut chain = RenderChain::new(format, &device);
    let initial = chain.current();

    for _ in 0..reported_errors {
        let error = LoadError {
            strategy: chain.current(),
            reason: "reported by client".to_string(),
        };
        if chain.on_load_error(error).is_none() {
            break;
        }
    }

    let outputs = chain
        .remaining()
        .into_iter()
        .map(|strategy| renderer_for(strategy).render(&source, format))
        .collect();

    ViewerPlan {
        format,
        device,
        initial,
        current: chain.current(),
        outputs,
        transitions: chain.transitions().to_vec(),
        transform,
        source,
    }
}
