pub mod aggregate;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod report;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod validation;
