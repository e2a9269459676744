pub mod app_state;
pub mod control;
pub mod policy;
pub mod registry;
pub mod session;
pub mod subscription;

pub use app_state::AppState;
pub use control::ControlError;
pub use registry::SessionRegistry;
pub use session::{Session, SubscriptionOutcome};
pub use subscription::Subscription;
