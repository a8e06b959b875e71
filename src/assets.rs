use std::time::Duration;

// capture profile
pub const FRAME_WIDTH: u32 = 480;
pub const FRAME_HEIGHT: u32 = 360;
pub const FRAME_RATE: u32 = 10;
pub const JPEG_QUALITY: u8 = 80;

// connections
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const MANUAL_CLOSE_CODE: u16 = 1000;
pub const OUTBOUND_QUEUE: usize = 32;

// capture scheduling
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(500);
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(200);
// the camera preview must be up before the socket gets a chance to block it
pub const CONNECT_DELAY: Duration = Duration::from_millis(300);

pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

pub const HEALTH_LOG_PERIOD: Duration = Duration::from_secs(30);
