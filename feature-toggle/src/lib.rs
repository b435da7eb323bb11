pub mod config;
pub mod dataset;
pub mod errors;
pub mod evaluation;
pub mod flag_record;
pub mod poller;
pub mod resolver;
pub mod source;
pub mod store;
pub mod stub;

// Shared by unit tests and the integration tests under tests/.
pub mod test_utils;

pub use resolver::{Resolution, Toggle, ToggleResolver, Toggled};
pub use store::{BooleanStore, FeatureStore, FlagStore};
pub use stub::Stub;

// Used by `toggle_stub!` so callers do not need async-trait in scope.
#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
}
