//! Request-side tracking: session resolution, device parsing, and the four
//! best-effort event recorders. Nothing in this crate ever surfaces an error
//! to the request it rides on.

pub mod device;
pub mod recorder;
pub mod request;
pub mod session;

pub use device::parse_user_agent;
pub use recorder::EventRecorder;
pub use request::RequestContext;
pub use session::{SessionTracker, TrackedSession};
