//! Trade window tabs: which one is selected, and stable records for all of them.

mod cache;
mod selection;


pub use cache::{RecordKey, TabCache, TabRecord, tab_title};
pub use selection::{SelectionReason, SelectionState, resolve};
