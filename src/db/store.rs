use std::collections::BTreeMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::StoreOptions;
use crate::db::{
    Pagination,
    error::{Error, Result},
    model::{
        contact::Contact,
        experiment::{Experiment, Lane, LanePoolLink},
        feature::{Feature, LibraryFeatureLink},
        index_kit::IndexKit,
        library::Library,
        link::{MuxTag, SampleLibraryLink},
        pool::Pool,
        request::{DeliveryEmail, SeqRequest},
        sample::Sample,
        user::User,
    },
};

/// Every row in the store. One map per entity kind, one vector per link
/// kind; link rows have no identity beyond their key pair.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub(crate) users: BTreeMap<Uuid, User>,
    pub(crate) contacts: BTreeMap<Uuid, Contact>,
    pub(crate) seq_requests: BTreeMap<Uuid, SeqRequest>,
    pub(crate) samples: BTreeMap<Uuid, Sample>,
    pub(crate) libraries: BTreeMap<Uuid, Library>,
    pub(crate) pools: BTreeMap<Uuid, Pool>,
    pub(crate) lanes: BTreeMap<Uuid, Lane>,
    pub(crate) experiments: BTreeMap<Uuid, Experiment>,
    pub(crate) index_kits: BTreeMap<Uuid, IndexKit>,
    pub(crate) features: BTreeMap<Uuid, Feature>,
    pub(crate) mux_tags: BTreeMap<Uuid, MuxTag>,

    pub(crate) sample_library_links: Vec<SampleLibraryLink>,
    pub(crate) lane_pool_links: Vec<LanePoolLink>,
    pub(crate) library_feature_links: Vec<LibraryFeatureLink>,
    pub(crate) delivery_emails: Vec<DeliveryEmail>,
}

/// Ties an entity type to its table and its name in error payloads.
pub trait Record: Sized + Clone {
    const ENTITY: &'static str;

    fn id(&self) -> Uuid;
    fn table(tables: &Tables) -> &BTreeMap<Uuid, Self>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self>;
}

macro_rules! record {
    ($type:ty, $entity:literal, $table:ident) => {
        impl Record for $type {
            const ENTITY: &'static str = $entity;

            fn id(&self) -> Uuid {
                self.id
            }

            fn table(tables: &Tables) -> &BTreeMap<Uuid, Self> {
                &tables.$table
            }

            fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Uuid, Self> {
                &mut tables.$table
            }
        }
    };
}

record!(User, "user", users);
record!(Contact, "contact", contacts);
record!(SeqRequest, "seq_request", seq_requests);
record!(Sample, "sample", samples);
record!(Library, "library", libraries);
record!(Pool, "pool", pools);
record!(Lane, "lane", lanes);
record!(Experiment, "experiment", experiments);
record!(IndexKit, "index_kit", index_kits);
record!(Feature, "feature", features);
record!(MuxTag, "mux_tag", mux_tags);

/// A unit of work over the store. Writes land on a private working copy;
/// the caller's closure returning `Ok` is what makes them visible.
pub struct Transaction {
    tables: Tables,
    options: StoreOptions,
}

impl Transaction {
    /// # Errors
    /// `ElementDoesNotExist` when no row has this id.
    pub fn fetch<R: Record>(&self, id: Uuid) -> Result<&R> {
        R::table(&self.tables)
            .get(&id)
            .ok_or_else(|| Error::not_found(R::ENTITY, id))
    }

    pub(crate) fn fetch_mut<R: Record>(&mut self, id: Uuid) -> Result<&mut R> {
        R::table_mut(&mut self.tables)
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(R::ENTITY, id))
    }

    /// Follows a link row to its endpoint. A missing endpoint means the
    /// graph itself is corrupt, which no caller can recover from.
    pub(crate) fn linked<R: Record>(&self, id: Uuid) -> &R {
        match R::table(&self.tables).get(&id) {
            Some(record) => record,
            None => panic!("link references missing {} {id}", R::ENTITY),
        }
    }

    pub(crate) fn linked_mut<R: Record>(&mut self, id: Uuid) -> &mut R {
        match R::table_mut(&mut self.tables).get_mut(&id) {
            Some(record) => record,
            None => panic!("link references missing {} {id}", R::ENTITY),
        }
    }

    pub(crate) fn insert<R: Record>(&mut self, record: R) -> Uuid {
        let id = record.id();
        R::table_mut(&mut self.tables).insert(id, record);

        id
    }

    pub(crate) fn remove<R: Record>(&mut self, id: Uuid) -> Result<R> {
        R::table_mut(&mut self.tables)
            .remove(&id)
            .ok_or_else(|| Error::not_found(R::ENTITY, id))
    }

    pub fn iter<'a, R: Record + 'a>(&'a self) -> impl Iterator<Item = &'a R> {
        R::table(&self.tables).values()
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }

    pub(crate) fn tables_mut(&mut self) -> &mut Tables {
        &mut self.tables
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    #[must_use]
    pub fn default_pagination(&self) -> Pagination {
        Pagination {
            limit: Some(self.options.page_limit),
            offset: None,
        }
    }
}

/// The committed state behind a lock. Writers are serialized: a
/// transaction observes the latest committed state, and its writes become
/// visible all at once or not at all.
pub struct Store {
    committed: RwLock<Tables>,
    options: StoreOptions,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    #[must_use]
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            committed: RwLock::new(Tables::default()),
            options,
        }
    }

    /// Runs `f` against a working copy of the committed state. An `Ok`
    /// return commits every write at once; an `Err` discards them all and
    /// hands the error back.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut committed = self.committed.write().expect("store lock poisoned");

        let mut txn = Transaction {
            tables: committed.clone(),
            options: self.options.clone(),
        };
        let value = f(&mut txn)?;
        *committed = txn.tables;

        Ok(value)
    }

    /// A consistent read-only snapshot for multi-read callers. Nothing a
    /// viewer computes can leak back into the committed state.
    pub fn view<T>(&self, f: impl FnOnce(&Transaction) -> T) -> T {
        let committed = self.committed.read().expect("store lock poisoned");

        let txn = Transaction {
            tables: committed.clone(),
            options: self.options.clone(),
        };

        f(&txn)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
