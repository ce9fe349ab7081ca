pub mod engine;
pub mod redo;
pub mod seam;

pub use engine::Engine;
pub use seam::{History, HistoryUpdate, Source};
