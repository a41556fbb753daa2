pub mod flag_client;

pub use flag_client::{FlagClient, SubmitOutcome};
