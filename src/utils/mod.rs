mod path;


pub use path::*;
