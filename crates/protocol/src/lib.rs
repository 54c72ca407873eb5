//! Replication of the permit wizard's session protocol.
//!
//! ```text
//! TabNavigator ──▶ RequestBuilder ──▶ Transport ──▶ server
//!      │                 ▲                │
//!      │                 │                ▼
//!      │            SessionManager ◀── Response
//!      ▼
//! DetailParser / AvailabilityDecoder / TableExtractor
//! ```

pub mod ids;
pub mod navigator;
pub mod request;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ids::{IdGenerator, RandomIdGenerator, SequenceIdGenerator};
pub use navigator::{TabNavigator, WalkOutcome, WalkState};
pub use request::{Action, FormId, Method, ProtocolRequest, RequestBuilder};
pub use session::{Session, SessionManager};
pub use transport::{HttpTransport, ReplayTransport, Response, Transport};
