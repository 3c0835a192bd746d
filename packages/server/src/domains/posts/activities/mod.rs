pub mod scan_published;

pub use scan_published::{scan_published, ScanReport, PAGE_SIZE};
