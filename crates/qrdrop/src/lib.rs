//! qrdrop - upload a file, scan a QR code, download it on another device.
//!
//! Library exposing the service pieces for the binary and for tests.

pub mod clock;
pub mod error;
pub mod gate;
pub mod links;
pub mod qr;
pub mod server;
pub mod share;
pub mod sweeper;
pub mod telemetry;
pub mod web;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Rejection, ShareError, NOT_FOUND_MESSAGE};
pub use gate::Resolution;
pub use links::{build_download_url, BaseUrl, BaseUrlError};
pub use share::{ShareService, UploadReceipt};
pub use sweeper::{spawn_sweeper, sweep_once, SweepReport};
