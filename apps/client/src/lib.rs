//! Client core for the applicant-tracking backend: session state, the service
//! operations behind the public application form and the HR dashboard, and the
//! HTTP transport they run on.

pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;
pub mod transport;

pub use routes::{guard, Navigator, Route, RouteHistory};
pub use service::ApplicantService;
pub use state::{SessionState, SessionStore};
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage};
pub use transport::{ApplicantTransport, HttpTransport, TransportError};
