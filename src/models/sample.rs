//! Sample payload published by the producer program

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery::OutgoingMessage;
use crate::error::Result;
use super::event::MessageHeader;

/// A randomly generated user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub height_cm: u32,
}

impl SampleUser {
    /// Generate a user with a random id and a height between 170 and 199 cm
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            id: Uuid::new_v4(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: "1990-01-01".to_string(),
            height_cm: 170 + rng.gen_range(0..30),
        }
    }

    /// Build the outgoing message for the n-th publish
    ///
    /// The key is the message number; headers carry the number and the
    /// send time in RFC 3339.
    pub fn to_message(
        &self,
        topic: &str,
        number: u64,
        sent_at: DateTime<Utc>,
    ) -> Result<OutgoingMessage> {
        let payload = serde_json::to_vec(self)?;
        Ok(OutgoingMessage::new(topic)
            .with_key(number.to_string())
            .with_payload(payload)
            .with_headers(vec![
                MessageHeader::new("message_number", number.to_string()),
                MessageHeader::new("timestamp", sent_at.to_rfc3339()),
            ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_height_range() {
        for _ in 0..50 {
            let user = SampleUser::random();
            assert!((170..200).contains(&user.height_cm));
        }
    }

    #[test]
    fn test_to_message() {
        let user = SampleUser::random();
        let sent_at = Utc::now();
        let message = user.to_message("users", 3, sent_at).unwrap();

        assert_eq!(message.topic, "users");
        assert_eq!(message.key.as_deref(), Some(&b"3"[..]));
        assert_eq!(message.headers[0], MessageHeader::new("message_number", "3"));
        assert_eq!(message.headers[1].key, "timestamp");

        let decoded: SampleUser = serde_json::from_slice(message.payload.as_deref().unwrap()).unwrap();
        assert_eq!(decoded, user);
    }
}
