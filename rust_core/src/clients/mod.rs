pub mod buttondown;
pub mod fred;

// Re-export commonly used types
pub use buttondown::{ButtondownClient, MailingListApi, MailingListError};
pub use fred::{FredClient, ObservationSource};
