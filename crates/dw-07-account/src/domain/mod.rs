//! Account domain: errors, recipients and input selection.

pub mod errors;
pub mod recipient;
pub mod selection;

pub use errors::AccountError;
pub use recipient::Recipient;
pub use selection::{is_spendable, select_inputs, unspent, Candidate};
