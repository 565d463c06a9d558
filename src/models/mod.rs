pub mod auth;
pub mod broadcast;
pub mod candidate;
pub mod health;
pub mod outcome;
pub mod response;
