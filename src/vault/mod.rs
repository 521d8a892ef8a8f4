pub mod audit;
pub mod config;
pub mod duplicate;
pub mod fetcher;
pub mod html;
pub mod index;
pub mod list_status;
pub mod lock;
pub mod paths;
pub mod sanitize;
pub mod source;
pub mod store;
pub mod sync;
pub mod util;
pub mod warn;
pub mod watcher;
