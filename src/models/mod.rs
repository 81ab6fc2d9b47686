pub mod entry;
pub mod events;
pub mod run;

pub use entry::*;
pub use events::*;
pub use run::*;
