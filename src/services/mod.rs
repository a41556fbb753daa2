pub mod filter_engine;
pub mod flag_store;
pub mod practice;
pub mod question_store;
pub mod update_controller;

pub use filter_engine::{categories, Direction, FilterEngine};
pub use flag_store::FlagStore;
pub use practice::{grade, PracticeStats, Verdict};
pub use question_store::{QuestionStore, SourceReport};
pub use update_controller::{UpdateAction, UpdateController, UpdateState};
