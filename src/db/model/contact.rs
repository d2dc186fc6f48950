use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Write, error, store::Transaction};

/// A person or billing address a request points at. Contacts carry no
/// consistency rules beyond referential existence; requests reference them
/// in up to four roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewContact {
    #[garde(length(min = 1, max = 128))]
    pub name: String,
    pub organization: Option<String>,
    #[garde(inner(email))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_code: Option<String>,
    pub address: Option<String>,
}

impl Write for NewContact {
    type Returns = Contact;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let Self {
            name,
            organization,
            email,
            phone,
            billing_code,
            address,
        } = self;

        let contact = Contact {
            id: Uuid::now_v7(),
            name,
            organization,
            email,
            phone,
            billing_code,
            address,
        };
        txn.insert(contact.clone());

        Ok(contact)
    }
}
