pub mod crtsh;
pub mod dns;
pub mod http;
pub mod massdns;

pub use crtsh::{CrtShClient, PassiveSource};
pub use dns::{CnameLookup, DnsConfig, DnsResolver};
pub use http::{HostProber, ProbeConfig, Prober};
pub use massdns::MassdnsResolver;
