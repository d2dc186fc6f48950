pub mod error;
pub mod model;
pub mod store;
pub(crate) mod util;

#[cfg(test)]
pub(crate) mod test_util;

use serde::{Deserialize, Serialize};
use store::{Record, Transaction};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub records: Vec<T>,
    pub n_pages: usize,
}

/// A write operation executed inside a [`store::Store`] transaction. The
/// whole operation commits or none of it does.
pub trait Write {
    type Returns;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns>;
}

pub trait FetchById: Sized {
    type Id;

    fn fetch_by_id(id: &Self::Id, txn: &Transaction) -> error::Result<Self>;
}

impl<R: Record> FetchById for R {
    type Id = uuid::Uuid;

    fn fetch_by_id(id: &Self::Id, txn: &Transaction) -> error::Result<Self> {
        txn.fetch::<R>(*id).cloned()
    }
}

pub trait FetchByQuery: Sized {
    type QueryParams;

    fn fetch_by_query(query: &Self::QueryParams, txn: &Transaction)
    -> error::Result<Paged<Self>>;
}
