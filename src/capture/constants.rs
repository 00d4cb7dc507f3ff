//! Constants for the capture module (timeouts, sniffing, filename probing).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
///
/// There is no read timeout: a live stream may idle while open.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default pause between capture attempts (5 seconds).
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Number of body bytes inspected when the Content-Type header is unusable.
pub const SNIFF_PREFIX_LEN: usize = 262;

/// Default strftime layout for the date part of output filenames (`16_10_2026`).
pub const DEFAULT_DATE_FORMAT: &str = "%d_%m_%Y";

/// Highest numeric suffix probed before the allocator gives up.
pub const MAX_SUFFIX: u32 = 9999;

/// Extensions preferred when a Content-Type maps to several candidates.
pub const DEFAULT_PREFERRED_EXTENSIONS: &[&str] = &["mp3"];
