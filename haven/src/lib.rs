pub mod auth;
pub mod clock;
pub mod error;
pub mod logger;
pub mod meeting;
pub mod model;
pub mod payment;
pub mod policy;
pub mod risk;
pub mod tls;

pub use error::HavenError;
