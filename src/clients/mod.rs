pub mod auth;
pub mod cursor;
pub mod database;
pub mod health;
pub mod qontak;
