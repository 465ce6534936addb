mod new_subscriber;
mod subscriber;
mod subscriber_email;
mod subscriber_name;
mod subscriber_status;

pub use new_subscriber::NewSubscriber;
pub use subscriber::Subscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;
pub use subscriber_status::SubscriberStatus;
