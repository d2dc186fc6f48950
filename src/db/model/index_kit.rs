use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    Write, error,
    error::Error,
    store::Transaction,
    util::rank_by_similarity,
};

/// A vendor barcode kit libraries can reference. Kit names are unique
/// across the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKit {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewIndexKit {
    #[garde(length(min = 1, max = 32))]
    pub identifier: String,
    #[garde(length(min = 1, max = 128))]
    pub name: String,
}

impl Write for NewIndexKit {
    type Returns = IndexKit;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let name = self.name.trim().to_string();

        if txn.iter::<IndexKit>().any(|kit| kit.name == name) {
            return Err(Error::not_unique("index_kit", "name", &name));
        }

        let kit = IndexKit {
            id: Uuid::now_v7(),
            identifier: self.identifier.trim().to_string(),
            name,
        };
        txn.insert(kit.clone());

        Ok(kit)
    }
}

impl IndexKit {
    /// Matches the original catalog search, which ranks on the identifier
    /// and name taken together.
    #[must_use]
    pub fn search_by_name(txn: &Transaction, word: &str, limit: Option<usize>) -> Vec<Self> {
        let kits: Vec<(String, Self)> = txn
            .iter::<Self>()
            .map(|kit| (format!("{} {}", kit.identifier, kit.name), kit.clone()))
            .collect();

        rank_by_similarity(kits, word, |(searchable, _)| searchable.as_str(), limit)
            .into_iter()
            .map(|(_, kit)| kit)
            .collect()
    }
}
