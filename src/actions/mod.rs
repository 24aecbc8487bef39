pub mod dispatcher;
pub mod handlers;
pub mod params;
pub mod preview;

pub use dispatcher::{ActionContext, ActionDispatcher, ActionFlags, ActionHandler, ActionRequest};
pub use params::ActionParams;
pub use preview::{Previewer, preview};
