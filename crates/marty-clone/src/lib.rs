mod ident;
mod sql;

mod inspector;
mod populator;

pub use inspector::HistoryInspector;
pub use populator::ClonePopulator;
