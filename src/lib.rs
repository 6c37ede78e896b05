pub mod bot;
pub mod config;
pub mod db;
pub mod export;
pub mod handlers;
pub mod keyboards;
pub mod localization;
pub mod mailing;
pub mod migrations;
pub mod payment;
pub mod repo;
pub mod scenario;
pub mod transport;
pub mod user_session;
pub mod utils;
