use std::sync::LazyLock;

use garde::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    FetchByQuery, Paged, Pagination, Write, error,
    error::Error,
    model::{
        experiment, feature,
        feature::Feature,
        index_kit::IndexKit,
        link::{MuxTag, SampleLibraryLink},
        pool,
        pool::Pool,
        request::SeqRequest,
        sample::Sample,
        status::LibraryStatus,
        user::User,
    },
    store::Transaction,
    util::{paginate, rank_by_similarity},
};

/// Positional barcode slots a library can carry (i7, i5 and their mates).
pub const INDEX_POSITIONS: usize = 4;

static DNA_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[ACGT]{1,32}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct DnaSequence(#[garde(pattern(DNA_REGEX))] pub String);

impl std::fmt::Display for DnaSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Up to four positional barcodes (i7/i5 and their mates) plus the shared
/// adapter. Position 1 decides whether the library counts as indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct IndexAssignment {
    #[garde(dive)]
    pub sequences: [Option<DnaSequence>; INDEX_POSITIONS],
    #[garde(inner(length(min = 1, max = 32)))]
    pub adapter: Option<String>,
}

impl IndexAssignment {
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.sequences[0].is_some()
    }

    #[must_use]
    pub fn raw(&self) -> [Option<String>; INDEX_POSITIONS] {
        std::array::from_fn(|position| {
            self.sequences[position].as_ref().map(|s| s.0.clone())
        })
    }
}

#[derive(
    Debug,
    Deserialize,
    Serialize,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumString,
    strum::VariantArray,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LibraryType {
    #[default]
    Custom,
    ScRnaSeq,
    SnRnaSeq,
    ScAtacSeq,
    CiteSeq,
    BulkRnaSeq,
    WholeGenomeSeq,
    ExomeSeq,
    AmpliconSeq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub library_type: LibraryType,
    pub status: LibraryStatus,
    pub owner_id: Uuid,
    pub seq_request_id: Option<Uuid>,
    pub pool_id: Option<Uuid>,
    pub index_kit_id: Option<Uuid>,
    pub index: IndexAssignment,
    pub num_samples: i64,
    pub num_features: i64,
    pub volume_ul: Option<f64>,
    pub dna_concentration: Option<f64>,
    pub total_size_bp: Option<i64>,
}

impl Library {
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.pool_id.is_some()
    }

    #[must_use]
    pub fn is_multiplexed(&self) -> bool {
        self.num_samples > 1
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.is_indexed()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewLibrary {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    pub library_type: LibraryType,
    pub owner_id: Uuid,
    pub seq_request_id: Option<Uuid>,
    pub pool_id: Option<Uuid>,
    pub index_kit_id: Option<Uuid>,
    #[garde(dive)]
    pub index: IndexAssignment,
    pub volume_ul: Option<f64>,
    pub dna_concentration: Option<f64>,
    pub total_size_bp: Option<i64>,
}

impl Write for NewLibrary {
    type Returns = Library;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;
        txn.fetch::<User>(self.owner_id)?;

        if let Some(index_kit_id) = self.index_kit_id {
            txn.fetch::<IndexKit>(index_kit_id)?;
        }

        if let Some(seq_request_id) = self.seq_request_id {
            txn.fetch_mut::<SeqRequest>(seq_request_id)?.num_libraries += 1;
        }

        // A library born into a pool skips straight to Pooled.
        let status = if let Some(pool_id) = self.pool_id {
            txn.fetch_mut::<Pool>(pool_id)?.num_libraries += 1;
            LibraryStatus::Pooled
        } else {
            LibraryStatus::Draft
        };

        let library = Library {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            library_type: self.library_type,
            status,
            owner_id: self.owner_id,
            seq_request_id: self.seq_request_id,
            pool_id: self.pool_id,
            index_kit_id: self.index_kit_id,
            index: self.index,
            num_samples: 0,
            num_features: 0,
            volume_ul: self.volume_ul,
            dna_concentration: self.dna_concentration,
            total_size_bp: self.total_size_bp,
        };
        txn.insert(library.clone());

        if let Some(pool_id) = library.pool_id {
            experiment::refresh_experiments_for_pool(txn, pool_id);
        }

        Ok(library)
    }
}

/// Partial update; `None` leaves a field as it was.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct UpdateLibrary {
    pub id: Uuid,
    #[garde(inner(length(min = 1, max = 64)))]
    pub name: Option<String>,
    #[garde(dive)]
    pub index: Option<IndexAssignment>,
    pub volume_ul: Option<f64>,
    pub dna_concentration: Option<f64>,
    pub total_size_bp: Option<i64>,
}

impl Write for UpdateLibrary {
    type Returns = Library;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let library = txn.fetch_mut::<Library>(self.id)?;

        if let Some(name) = self.name {
            library.name = name.trim().to_string();
        }
        if let Some(index) = self.index {
            library.index = index;
        }
        if let Some(volume_ul) = self.volume_ul {
            library.volume_ul = Some(volume_ul);
        }
        if let Some(dna_concentration) = self.dna_concentration {
            library.dna_concentration = Some(dna_concentration);
        }
        if let Some(total_size_bp) = self.total_size_bp {
            library.total_size_bp = Some(total_size_bp);
        }

        Ok(library.clone())
    }
}

/// Assigns a library to a pool, advancing it to Pooled. Re-pooling moves
/// the library out of its previous pool, which is deleted if it ends up
/// empty.
#[derive(Debug, Clone, Copy)]
pub struct PoolLibrary {
    pub library_id: Uuid,
    pub pool_id: Uuid,
}

impl Write for PoolLibrary {
    type Returns = Library;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            library_id,
            pool_id,
        } = self;

        txn.fetch::<Pool>(pool_id)?;
        let previous_pool = txn.fetch::<Library>(library_id)?.pool_id;

        if previous_pool == Some(pool_id) {
            return Err(Error::link_already_exists(
                "library", library_id, "pool", pool_id,
            ));
        }

        if let Some(previous) = previous_pool {
            let old_pool = txn.linked_mut::<Pool>(previous);
            old_pool.num_libraries -= 1;
            let emptied = old_pool.num_libraries == 0;

            if emptied {
                pool::delete_pool_record(txn, previous)?;
            } else {
                experiment::refresh_experiments_for_pool(txn, previous);
            }
        }

        txn.fetch_mut::<Pool>(pool_id)?.num_libraries += 1;

        let library = txn.fetch_mut::<Library>(library_id)?;
        library.pool_id = Some(pool_id);
        library.status = LibraryStatus::Pooled;
        let library = library.clone();

        experiment::refresh_experiments_for_pool(txn, pool_id);

        Ok(library)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssignLibraryRequest {
    pub library_id: Uuid,
    pub seq_request_id: Uuid,
}

impl Write for AssignLibraryRequest {
    type Returns = Library;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            library_id,
            seq_request_id,
        } = self;

        txn.fetch::<SeqRequest>(seq_request_id)?;
        let current = txn.fetch::<Library>(library_id)?.seq_request_id;

        match current {
            Some(assigned) if assigned == seq_request_id => {
                return Err(Error::link_already_exists(
                    "library",
                    library_id,
                    "seq_request",
                    seq_request_id,
                ));
            }
            Some(assigned) => {
                return Err(Error::invalid_value(format!(
                    "library {library_id} already belongs to seq_request {assigned}"
                )));
            }
            None => {}
        }

        txn.fetch_mut::<SeqRequest>(seq_request_id)?.num_libraries += 1;

        let library = txn.fetch_mut::<Library>(library_id)?;
        library.seq_request_id = Some(seq_request_id);

        Ok(library.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReleaseLibraryRequest {
    pub library_id: Uuid,
    pub seq_request_id: Uuid,
}

impl Write for ReleaseLibraryRequest {
    type Returns = Library;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            library_id,
            seq_request_id,
        } = self;

        txn.fetch::<SeqRequest>(seq_request_id)?;

        if txn.fetch::<Library>(library_id)?.seq_request_id != Some(seq_request_id) {
            return Err(Error::link_does_not_exist(
                "library",
                library_id,
                "seq_request",
                seq_request_id,
            ));
        }

        txn.fetch_mut::<SeqRequest>(seq_request_id)?.num_libraries -= 1;

        let library = txn.fetch_mut::<Library>(library_id)?;
        library.seq_request_id = None;

        Ok(library.clone())
    }
}

/// Tears a library out of the graph: sample links (with mux-tag and
/// orphan-sample cleanup), the pool reference (deleting an emptied pool),
/// orphaned custom features, and the owning request's counter all go in
/// one transaction.
#[derive(Debug, Clone, Copy)]
pub struct DeleteLibrary {
    pub id: Uuid,
}

impl Write for DeleteLibrary {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let library = txn.fetch::<Library>(self.id)?.clone();
        tracing::debug!(library_id = %self.id, "deleting library");

        let sample_links: Vec<SampleLibraryLink> = txn
            .tables()
            .sample_library_links
            .iter()
            .filter(|link| link.library_id == self.id)
            .cloned()
            .collect();
        txn.tables_mut()
            .sample_library_links
            .retain(|link| link.library_id != self.id);

        for link in &sample_links {
            let sample = txn.linked_mut::<Sample>(link.sample_id);
            sample.num_libraries -= 1;

            if sample.num_libraries == 0 {
                txn.remove::<Sample>(link.sample_id)?;
            }

            if let Some(mux_tag_id) = link.mux_tag_id {
                let still_referenced = txn
                    .tables()
                    .sample_library_links
                    .iter()
                    .any(|l| l.mux_tag_id == Some(mux_tag_id));
                if !still_referenced {
                    txn.remove::<MuxTag>(mux_tag_id)?;
                }
            }
        }

        if let Some(pool_id) = library.pool_id {
            let pool = txn.linked_mut::<Pool>(pool_id);
            pool.num_libraries -= 1;
            let emptied = pool.num_libraries == 0;

            if emptied {
                pool::delete_pool_record(txn, pool_id)?;
            } else {
                experiment::refresh_experiments_for_pool(txn, pool_id);
            }
        }

        let feature_links: Vec<Uuid> = txn
            .tables()
            .library_feature_links
            .iter()
            .filter(|link| link.library_id == self.id)
            .map(|link| link.feature_id)
            .collect();
        txn.tables_mut()
            .library_feature_links
            .retain(|link| link.library_id != self.id);

        for feature_id in feature_links {
            let feature = txn.linked::<Feature>(feature_id);
            if feature.kit_id.is_some() {
                continue;
            }

            if feature::is_orphaned(txn, feature_id) {
                txn.remove::<Feature>(feature_id)?;
            }
        }

        if let Some(seq_request_id) = library.seq_request_id {
            txn.linked_mut::<SeqRequest>(seq_request_id).num_libraries -= 1;
        }

        txn.remove::<Library>(self.id)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryQuery {
    pub ids: Vec<Uuid>,
    pub name: Option<String>,
    pub owner_id: Option<Uuid>,
    pub seq_request_id: Option<Uuid>,
    pub pool_id: Option<Uuid>,
    pub sample_id: Option<Uuid>,
    pub pooled: Option<bool>,
    pub pagination: Option<Pagination>,
}

impl FetchByQuery for Library {
    type QueryParams = LibraryQuery;

    fn fetch_by_query(query: &Self::QueryParams, txn: &Transaction) -> error::Result<Paged<Self>> {
        let LibraryQuery {
            ids,
            name,
            owner_id,
            seq_request_id,
            pool_id,
            sample_id,
            pooled,
            pagination,
        } = query;

        let linked_libraries: Option<Vec<Uuid>> = sample_id.map(|sample_id| {
            txn.tables()
                .sample_library_links
                .iter()
                .filter(|link| link.sample_id == sample_id)
                .map(|link| link.library_id)
                .collect()
        });

        let name = name.as_ref().map(|n| n.to_lowercase());

        let mut records: Vec<Library> = txn
            .iter::<Library>()
            .filter(|l| ids.is_empty() || ids.contains(&l.id))
            .filter(|l| owner_id.is_none_or(|owner| l.owner_id == owner))
            .filter(|l| seq_request_id.is_none_or(|req| l.seq_request_id == Some(req)))
            .filter(|l| pool_id.is_none_or(|pool| l.pool_id == Some(pool)))
            .filter(|l| pooled.is_none_or(|pooled| l.is_pooled() == pooled))
            .filter(|l| {
                linked_libraries
                    .as_ref()
                    .is_none_or(|linked| linked.contains(&l.id))
            })
            .filter(|l| {
                name.as_ref()
                    .is_none_or(|name| l.name.to_lowercase().contains(name))
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

impl Library {
    #[must_use]
    pub fn search_by_name(txn: &Transaction, word: &str, limit: Option<usize>) -> Vec<Self> {
        let libraries: Vec<Self> = txn.iter::<Self>().cloned().collect();

        rank_by_similarity(libraries, word, |l| l.name.as_str(), limit)
    }
}
