pub mod messages;
pub mod records;

pub use messages::{is_valid_message, MessageStore};
pub use records::store_record;
