//! Portal Client - vendor API access
//!
//! REST calls against the vendor backend, the persisted session, and the
//! order push stream.

pub mod config;
pub mod error;
pub mod http;
pub mod notification;
pub mod session;

pub use config::{DEFAULT_API_BASE, PortalConfig};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, PortalApi};
pub use session::{SessionStore, StaticToken, TokenSource};

// Push notifications
pub use notification::{
    ConnectionState, ListenerHandle, NotificationClient, NotificationConfig, NotificationEvent,
};
