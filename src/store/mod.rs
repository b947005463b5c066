mod api;
mod version;
mod watch;


pub use api::*;
pub use version::*;
pub use watch::*;
