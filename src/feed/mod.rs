pub mod fetcher;
pub mod source;

pub use fetcher::FeedFetcher;
pub use source::FeedSource;
