pub mod config;
pub mod grants;
pub mod health;
pub mod permissions;
pub mod protocols;
