pub mod config;
pub mod destroy;
pub mod output;
pub mod preview;
pub mod up;
pub mod validate;
