use std::collections::BTreeSet;

use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    FetchByQuery, Paged, Pagination, Write, error,
    error::Error,
    model::{status::SampleStatus, user::User},
    store::Transaction,
    util::{paginate, rank_by_similarity},
};

/// Biological material. A sample has no independent existence once every
/// library link is gone: the unlink that drops `num_libraries` to zero
/// deletes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub name: String,
    pub organism_tax_id: i64,
    pub owner_id: Uuid,
    pub status: SampleStatus,
    pub num_libraries: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewSample {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    #[garde(range(min = 1))]
    pub organism_tax_id: i64,
    pub owner_id: Uuid,
}

impl Write for NewSample {
    type Returns = Sample;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;
        txn.fetch::<User>(self.owner_id)?;

        let sample = Sample {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            organism_tax_id: self.organism_tax_id,
            owner_id: self.owner_id,
            status: SampleStatus::Draft,
            num_libraries: 0,
        };
        txn.insert(sample.clone());

        Ok(sample)
    }
}

/// Direct deletion of a sample that still backs a library is refused; the
/// library side has to let go first.
#[derive(Debug, Clone, Copy)]
pub struct DeleteSample {
    pub id: Uuid,
}

impl Write for DeleteSample {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let sample = txn.fetch::<Sample>(self.id)?;

        if sample.num_libraries > 0 {
            return Err(Error::invalid_value(format!(
                "sample {} is still linked to {} libraries",
                self.id, sample.num_libraries
            )));
        }

        txn.remove::<Sample>(self.id)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleQuery {
    pub ids: Vec<Uuid>,
    pub name: Option<String>,
    pub owner_id: Option<Uuid>,
    pub library_id: Option<Uuid>,
    pub pagination: Option<Pagination>,
}

impl FetchByQuery for Sample {
    type QueryParams = SampleQuery;

    fn fetch_by_query(query: &Self::QueryParams, txn: &Transaction) -> error::Result<Paged<Self>> {
        let SampleQuery {
            ids,
            name,
            owner_id,
            library_id,
            pagination,
        } = query;

        let linked_samples: Option<BTreeSet<Uuid>> = library_id.map(|library_id| {
            txn.tables()
                .sample_library_links
                .iter()
                .filter(|link| link.library_id == library_id)
                .map(|link| link.sample_id)
                .collect()
        });

        let name = name.as_ref().map(|n| n.to_lowercase());

        let mut records: Vec<Sample> = txn
            .iter::<Sample>()
            .filter(|s| ids.is_empty() || ids.contains(&s.id))
            .filter(|s| owner_id.is_none_or(|owner| s.owner_id == owner))
            .filter(|s| {
                linked_samples
                    .as_ref()
                    .is_none_or(|linked| linked.contains(&s.id))
            })
            .filter(|s| {
                name.as_ref()
                    .is_none_or(|name| s.name.to_lowercase().contains(name))
            })
            .cloned()
            .collect();

        records.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));

        Ok(paginate(
            records,
            pagination.unwrap_or_else(|| txn.default_pagination()),
        ))
    }
}

impl Sample {
    /// Fuzzy name search used by listing paths; ordering only, no filters.
    #[must_use]
    pub fn search_by_name(txn: &Transaction, word: &str, limit: Option<usize>) -> Vec<Self> {
        let samples: Vec<Self> = txn.iter::<Self>().cloned().collect();

        rank_by_similarity(samples, word, |s| s.name.as_str(), limit)
    }
}
