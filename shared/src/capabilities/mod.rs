// Crux's built-in Render capability covers view updates as-is.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
#[allow(unused_imports)]
use crate::App;

/// Everything the core can ask of the shell. The derive generates the
/// `Effect` enum (`Effect::Http`, `Effect::Render`) the shell matches on.
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
