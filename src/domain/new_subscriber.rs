use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;

/// Input of an insert. The status column is left to its database default.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub name: Option<SubscriberName>,
}

impl NewSubscriber {
    pub fn parse(email: String, name: Option<String>) -> Result<Self, String> {
        let email = SubscriberEmail::parse(email)?;
        let name = name.map(SubscriberName::parse).transpose()?;
        Ok(Self { email, name })
    }
}
