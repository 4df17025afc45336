mod automation;
mod driver;
mod error;

pub use automation::{ChromiumDriver, SessionFuture, SessionManager};
pub use driver::{ElementHandle, PageDriver, WaitPolicy, SCROLL_TO_BOTTOM_SCRIPT};
pub use error::{DriverError, DriverResult};
