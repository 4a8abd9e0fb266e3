use std::any::Any;
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Method, Response, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::form_urlencoded;

use crate::activity_log::ActivityLog;
use crate::manager::ProcessService;
use crate::process::{PriorityLevel, ProcessRecord};

pub type HttpResponse = Response<Full<Bytes>>;

const INDEX_HTML: &str = include_str!("../../static/index.html");
pub const NO_LOGS: &str = "No logs found.";
pub const INVALID_PID: &str = "Invalid process ID";

pub const DEFAULT_TOP_COUNT: i32 = 5;
pub const MIN_TOP_COUNT: i32 = 1;
pub const MAX_TOP_COUNT: i32 = 20;

/// `{id, name, memoryUsageMb, cpuTime}` with cpu time in seconds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessView<'a> {
    id: i32,
    name: &'a str,
    memory_usage_mb: f64,
    cpu_time: f64,
}

impl<'a> From<&'a ProcessRecord> for ProcessView<'a> {
    fn from(record: &'a ProcessRecord) -> Self {
        ProcessView {
            id: record.id,
            name: &record.name,
            memory_usage_mb: record.memory_usage_mb,
            cpu_time: record.cpu_time.as_secs_f64(),
        }
    }
}

/// Body of every POST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        ActionResult { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ActionResult { success: false, message: message.into() }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Maps `(method, path)` to a handler. Requests are answered synchronously; callers decide
/// which thread that happens on.
pub struct Router<S> {
    processes: Arc<S>,
    log: Arc<dyn ActivityLog>,
}

impl<S: ProcessService> Router<S> {
    pub fn new(processes: Arc<S>, log: Arc<dyn ActivityLog>) -> Self {
        Router { processes, log }
    }

    pub fn activity_log(&self) -> &Arc<dyn ActivityLog> {
        &self.log
    }

    pub fn respond(&self, method: &Method, uri: &Uri) -> HttpResponse {
        let query = uri.query().unwrap_or("");
        debug!(%method, path = uri.path(), "dispatching request");

        match (method, uri.path()) {
            (&Method::GET, "/") => text(StatusCode::OK, "text/html; charset=utf-8", INDEX_HTML),
            (&Method::GET, "/api/processes") => self.processes(),
            (&Method::GET, "/api/logs") => self.logs(),
            (&Method::POST, "/api/boost") => self.boost(query),
            (&Method::POST, "/api/log-top-processes") => self.log_top_processes(query),
            _ => empty(StatusCode::NOT_FOUND),
        }
    }

    //Newest processes first
    fn processes(&self) -> HttpResponse {
        let result = guarded(|| {
            let records = self.processes.list_all_sorted_by_descending(|p| p.start_time);
            let views: Vec<ProcessView<'_>> = records.iter().map(ProcessView::from).collect();
            serde_json::to_vec(&views).map_err(|e| e.to_string())
        });

        match result {
            Ok(body) => json_bytes(StatusCode::OK, body),
            Err(message) => {
                error!(%message, "failed to list processes");
                json(StatusCode::INTERNAL_SERVER_ERROR, &ErrorBody { error: &message })
            }
        }
    }

    fn logs(&self) -> HttpResponse {
        let body = match guarded(|| read_log(self.log.path())) {
            Ok(contents) => contents,
            Err(message) => format!("Error reading log file: {message}"),
        };
        text(StatusCode::OK, "text/plain; charset=utf-8", body)
    }

    fn boost(&self, query: &str) -> HttpResponse {
        let result = guarded(|| {
            let Some(pid) = int_param(query, "pid") else {
                return Ok(ActionResult::failed(INVALID_PID));
            };

            Ok(if self.processes.set_priority(pid, PriorityLevel::High) {
                ActionResult::ok(format!("Process {pid} priority set to High"))
            } else {
                ActionResult::failed(format!("Failed to set process {pid} priority"))
            })
        });

        json(StatusCode::OK, &result.unwrap_or_else(ActionResult::failed))
    }

    fn log_top_processes(&self, query: &str) -> HttpResponse {
        let result = guarded(|| {
            let count = top_count(query);
            let mut top = self
                .processes
                .list_all_sorted_by_descending(|p| p.memory_usage_mb);
            top.truncate(count as usize);
            self.log.log_processes(&top);

            Ok(ActionResult::ok(format!("Logged top {count} processes")))
        });

        json(StatusCode::OK, &result.unwrap_or_else(ActionResult::failed))
    }
}

/// `count` from the query, defaulting to 5 and clamped into 1..=20.
pub fn top_count(query: &str) -> i32 {
    int_param(query, "count")
        .map(|n| n.clamp(MIN_TOP_COUNT, MAX_TOP_COUNT))
        .unwrap_or(DEFAULT_TOP_COUNT)
}

// First occurrence wins
fn int_param(query: &str, key: &str) -> Option<i32> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.trim().parse::<i32>().ok())
}

fn read_log(path: &Path) -> Result<String, String> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(NO_LOGS.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Runs one handler body, turning a panic into an error message for that route.
fn guarded<T>(handler: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(handler))
        .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn empty(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_bytes(status: StatusCode, body: Vec<u8>) -> HttpResponse {
    text(status, "application/json", body)
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => json_bytes(status, body),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
