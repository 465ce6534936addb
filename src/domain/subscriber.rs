use crate::domain::SubscriberStatus;
use chrono::{DateTime, Utc};

/// A row of the `subscribers` table.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: u64,
    pub email: String,
    pub name: Option<String>,
    pub status: SubscriberStatus,
    pub created_at: DateTime<Utc>,
}
