pub mod connection;
pub mod manager;
