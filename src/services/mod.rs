pub mod external;
pub mod pipeline;
pub mod resolution;
pub mod wordlist;

pub use pipeline::SearchPipeline;
pub use resolution::{ResolutionEngine, Resolver};
pub use wordlist::WordlistGenerator;
