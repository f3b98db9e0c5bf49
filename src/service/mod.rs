pub mod auth;
pub mod booking;
pub mod crypto;
pub mod event;
pub mod log;
pub mod notification;
pub mod security;
