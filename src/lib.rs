mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pool;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod server {
    pub mod handlers;
    pub mod media;
    pub mod routes;
}
pub mod config;
mod constants;
pub mod state;

pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use server::*;
