pub mod automation;
pub mod error;
pub mod page;
pub mod session;

pub use automation::PageAutomation;
pub use error::CaptureError;
pub use page::{Extractor, Link, PageSnapshot, WaitPolicy};
pub use session::HttpSession;
