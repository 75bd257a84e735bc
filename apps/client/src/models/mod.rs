pub mod applicant;
pub mod application;
pub mod auth;

pub use applicant::{Applicant, ApplicantPatch, ApplicantStatus};
pub use application::{ApplicationForm, Attachment};
pub use auth::{Credentials, TokenPair};
