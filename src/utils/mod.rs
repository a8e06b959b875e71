pub mod generation;
pub mod subscription;

pub use generation::Generation;
pub use subscription::{Handler, SubscriberList, SubscriptionId};
