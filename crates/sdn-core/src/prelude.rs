/*!
 * Prelude module for SDN Core.
 *
 * Re-exports the types most callers need in one import.
 */

pub use crate::config::{Config, ConfigBuilder, SharedConfig};
pub use crate::error::{Error, Result};
pub use crate::event::{EventBus, SharedEventBus};
pub use crate::types::Value;
pub use crate::utils::{spawn_component, with_timeout};

pub use tracing::{debug, error, info, trace, warn};
