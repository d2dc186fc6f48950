use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Write, error, store::Transaction};

/// The identity collaborator's surface: a validated user id plus the
/// denormalized request counter this core maintains. Authorization is the
/// caller's problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub num_seq_requests: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewUser {
    #[garde(length(min = 1, max = 128))]
    pub name: String,
    #[garde(email)]
    pub email: String,
}

impl Write for NewUser {
    type Returns = User;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let user = User {
            id: Uuid::now_v7(),
            name: self.name,
            email: self.email,
            num_seq_requests: 0,
        };
        txn.insert(user.clone());

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{FetchById, error::Error, store::Store};

    #[test]
    fn new_user_starts_with_zero_requests() {
        let store = Store::new();

        let user = store
            .transaction(|txn| {
                NewUser {
                    name: "Rick Sanchez".to_string(),
                    email: "rick@example.com".to_string(),
                }
                .write(txn)
            })
            .unwrap();

        assert_eq!(user.num_seq_requests, 0);

        let fetched = store.view(|txn| User::fetch_by_id(&user.id, txn)).unwrap();
        assert_eq!(fetched, user);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let store = Store::new();

        let err = store
            .transaction(|txn| {
                NewUser {
                    name: "Rick Sanchez".to_string(),
                    email: "not-an-email".to_string(),
                }
                .write(txn)
            })
            .unwrap_err();

        assert!(matches!(err, Error::InvalidValue { .. }));
    }
}
