pub mod browser;
pub mod capture;
pub mod listing_crawler;
pub mod rooms;
pub mod traits;
pub mod types;

pub use browser::OstrovokBrowserScraper;
pub use traits::RoomRateSource;
