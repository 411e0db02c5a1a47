pub mod action;
pub mod events;
pub mod table;

pub use action::TableAction;
pub use events::{EventSink, GroupChange, Highlight, TableEvent};
pub use table::{GameTable, TableError};
