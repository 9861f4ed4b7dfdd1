mod entry;
mod subscription;

pub use entry::FeedEntry;
pub use subscription::{NewSubscription, Subscription};
