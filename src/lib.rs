pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod validator;
