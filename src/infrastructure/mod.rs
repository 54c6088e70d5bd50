pub mod db;
pub mod distributed_lock;
pub mod log_redact;
pub mod logging;
pub mod timeout;
pub mod user_lock;
