//! Wiring of the packing back office: list feed, scan lookup and batch
//! actions sharing one API client and one configuration.

mod session;

pub use session::{page_sizer_from_config, scroll_config_from_config, DeskSession};
