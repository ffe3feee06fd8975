pub mod app;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod extract;
pub mod maps;
pub mod memory;
pub mod pagination;
pub mod repository;
pub mod schedules;
pub mod state;
