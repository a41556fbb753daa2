pub mod filter;
pub mod flag;
pub mod question;
pub mod raw;
pub mod source;

pub use filter::{FilterState, ALL_CATEGORIES};
pub use flag::{FlagExport, FlagPayload, FlagRecord, QuestionSnapshot};
pub use question::{Choice, Question, QuestionKind, StudyMode};
pub use raw::normalize;
pub use source::{QuestionSource, SourceKind};
