//! HTTP surface: a fixed route table over the process service, served sequentially.

mod router;
mod server;

pub use router::{
    ActionResult, HttpResponse, Router, DEFAULT_TOP_COUNT, INVALID_PID, MAX_TOP_COUNT,
    MIN_TOP_COUNT, NO_LOGS, top_count,
};
pub use server::HttpServer;
