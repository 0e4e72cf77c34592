pub mod browser;
pub mod environment;
pub mod runtime;
