pub mod session;

pub use session::{normalize_label, SessionRecord, UNLABELED};
