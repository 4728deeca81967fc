//! Constants for the download module (timeouts, PDF detection).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Bytes inspected when the response headers do not identify a PDF.
pub const SNIFF_LEN: usize = 1024;

/// Leading bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Media type accepted without sniffing.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Suffix of in-progress download files.
pub const PARTIAL_SUFFIX: &str = "part";

/// Default fixed delay between download attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
