// Product authoring workflow
pub mod authoring;

// Accounts and profiles
pub mod accounts;

pub use accounts::AccountService;
pub use authoring::{AuthoringSession, SessionMode, SessionState, SubmitOutcome};
