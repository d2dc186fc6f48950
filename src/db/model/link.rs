use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    Write, error,
    error::Error,
    model::{
        library::{DnaSequence, Library},
        sample::Sample,
    },
    store::Transaction,
};

/// A per-sample multiplexing tag distinguishing samples pooled into the
/// same library. Owned by the links that reference it: the last unlink
/// deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxTag {
    pub id: Uuid,
    pub sequence: DnaSequence,
    pub pattern: Option<String>,
    pub read: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewMuxTag {
    #[garde(dive)]
    pub sequence: DnaSequence,
    pub pattern: Option<String>,
    pub read: Option<String>,
}

/// Join row between a sample and a library. Unique per id pair; the row
/// and both denormalized counters move together in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLibraryLink {
    pub sample_id: Uuid,
    pub library_id: Uuid,
    pub mux_tag_id: Option<Uuid>,
}

impl SampleLibraryLink {
    #[must_use]
    pub fn for_sample(txn: &Transaction, sample_id: Uuid) -> Vec<Self> {
        txn.tables()
            .sample_library_links
            .iter()
            .filter(|link| link.sample_id == sample_id)
            .copied()
            .collect()
    }

    #[must_use]
    pub fn for_library(txn: &Transaction, library_id: Uuid) -> Vec<Self> {
        txn.tables()
            .sample_library_links
            .iter()
            .filter(|link| link.library_id == library_id)
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewSampleLibraryLink {
    pub sample_id: Uuid,
    pub library_id: Uuid,
    #[garde(dive)]
    pub mux_tag: Option<NewMuxTag>,
}

impl Write for NewSampleLibraryLink {
    type Returns = SampleLibraryLink;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let Self {
            sample_id,
            library_id,
            mux_tag,
        } = self;

        txn.fetch::<Sample>(sample_id)?;
        txn.fetch::<Library>(library_id)?;

        let already_linked = txn
            .tables()
            .sample_library_links
            .iter()
            .any(|link| link.sample_id == sample_id && link.library_id == library_id);
        if already_linked {
            return Err(Error::link_already_exists(
                "sample", sample_id, "library", library_id,
            ));
        }

        let mux_tag_id = mux_tag.map(|tag| {
            let mux_tag = MuxTag {
                id: Uuid::now_v7(),
                sequence: tag.sequence,
                pattern: tag.pattern,
                read: tag.read,
            };
            txn.insert(mux_tag)
        });

        let link = SampleLibraryLink {
            sample_id,
            library_id,
            mux_tag_id,
        };
        txn.tables_mut().sample_library_links.push(link);

        txn.fetch_mut::<Sample>(sample_id)?.num_libraries += 1;
        txn.fetch_mut::<Library>(library_id)?.num_samples += 1;

        Ok(link)
    }
}

/// Unlinks the pair, releasing a mux tag nothing references any more and
/// deleting a sample whose last library just let go of it.
#[derive(Debug, Clone, Copy)]
pub struct DeleteSampleLibraryLink {
    pub sample_id: Uuid,
    pub library_id: Uuid,
}

impl Write for DeleteSampleLibraryLink {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            sample_id,
            library_id,
        } = self;

        txn.fetch::<Sample>(sample_id)?;
        txn.fetch::<Library>(library_id)?;

        let position = txn
            .tables()
            .sample_library_links
            .iter()
            .position(|link| link.sample_id == sample_id && link.library_id == library_id)
            .ok_or_else(|| {
                Error::link_does_not_exist("sample", sample_id, "library", library_id)
            })?;
        let link = txn.tables_mut().sample_library_links.remove(position);

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

        txn.fetch_mut::<Library>(library_id)?.num_samples -= 1;

        let sample = txn.fetch_mut::<Sample>(sample_id)?;
        sample.num_libraries -= 1;

        if sample.num_libraries == 0 {
            tracing::debug!(sample_id = %sample_id, "deleting fully unlinked sample");
            txn.remove::<Sample>(sample_id)?;
        }

        Ok(())
    }
}
