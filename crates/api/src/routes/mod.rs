pub mod auth;
pub mod drivers;
pub mod monitor;
