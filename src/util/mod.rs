pub mod logger;
pub mod timer;
