//! Blocking client for the Toon smart thermostat API.
//!
//! ```no_run
//! use toon_client::{Credentials, ToonClient};
//!
//! let creds = Credentials::new("user", "password", "eneco", "consumer-key", "consumer-secret");
//! let client = ToonClient::new(creds);
//! for agreement in client.list_agreements()? {
//!     let status = client.get_status(&agreement.agreement_id)?;
//!     println!("{:?}", status.thermostat_info);
//! }
//! # Ok::<(), toon_client::FetchError>(())
//! ```

pub mod models {
    pub mod toon;
}

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod resources;
pub mod transport;
pub mod utils;

pub use auth::{Credentials, NoRenewal, RefreshGrant, Token, TokenRenewal};
pub use client::ToonClient;
pub use config::Config;
pub use endpoints::Endpoints;
pub use error::{AuthError, FetchError, TransportError};
pub use resources::PollPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Timeouts, UreqTransport};
