pub mod collector;
pub mod rss_feed;

pub use collector::FeedCollector;
pub use rss_feed::RssFeedSource;
