pub mod cors;
pub mod logging;
pub mod rate_limit;

pub use cors::*;
pub use logging::*;
pub use rate_limit::*;
