mod new_subscriber;
mod subscriber;
mod subscriber_email;

pub use new_subscriber::{NewSubscriber, SubscribeRequest};
pub use subscriber::Subscriber;
pub use subscriber_email::SubscriberEmail;
