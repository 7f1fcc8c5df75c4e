pub mod config;
pub mod conversations;
pub mod events;
pub mod messaging;
pub mod polling;
pub mod scroll;
pub mod session;
pub mod state;
pub mod transport;

pub use config::SyncConfig;
pub use events::{EventBus, SyncEvent};
pub use messaging::{MessagingError, SendOutcome};
pub use session::ChatSession;
pub use state::SessionContext;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
