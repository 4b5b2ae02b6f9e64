use std::time::Duration;

pub const BASE_URL: &str = "ws://localhost:8000/ws/realtime-translation";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_SEND_BUFFER: usize = 64;
pub const DEFAULT_CAPACITY: usize = 1024;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

pub const BACKEND_URL_VAR: &str = "GESTURE_BACKEND_URL";
pub const AUTH_TOKEN_VAR: &str = "GESTURE_AUTH_TOKEN";
pub const MAX_ATTEMPTS_VAR: &str = "GESTURE_MAX_ATTEMPTS";
pub const BACKOFF_VAR: &str = "GESTURE_BACKOFF";
pub const RETRY_DELAY_MS_VAR: &str = "GESTURE_RETRY_DELAY_MS";
pub const RETRY_MAX_DELAY_MS_VAR: &str = "GESTURE_RETRY_MAX_DELAY_MS";
pub const SEND_BUFFER_VAR: &str = "GESTURE_SEND_BUFFER";
