use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    Write, error,
    error::Error,
    model::library::Library,
    store::Transaction,
};

/// A capture feature (antibody tag, CRISPR guide, ...) libraries can
/// reference. Features from a published kit outlive their links; custom
/// ones are purged with the last library that used them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub kit_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewFeature {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    pub kit_id: Option<Uuid>,
}

impl Write for NewFeature {
    type Returns = Feature;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let feature = Feature {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            kit_id: self.kit_id,
        };
        txn.insert(feature.clone());

        Ok(feature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFeatureLink {
    pub library_id: Uuid,
    pub feature_id: Uuid,
}

pub(crate) fn is_orphaned(txn: &Transaction, feature_id: Uuid) -> bool {
    !txn.tables()
        .library_feature_links
        .iter()
        .any(|link| link.feature_id == feature_id)
}

#[derive(Debug, Clone, Copy)]
pub struct NewLibraryFeatureLink {
    pub library_id: Uuid,
    pub feature_id: Uuid,
}

impl Write for NewLibraryFeatureLink {
    type Returns = LibraryFeatureLink;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            library_id,
            feature_id,
        } = self;

        txn.fetch::<Library>(library_id)?;
        txn.fetch::<Feature>(feature_id)?;

        let already_linked = txn
            .tables()
            .library_feature_links
            .iter()
            .any(|link| link.library_id == library_id && link.feature_id == feature_id);
        if already_linked {
            return Err(Error::link_already_exists(
                "library", library_id, "feature", feature_id,
            ));
        }

        let link = LibraryFeatureLink {
            library_id,
            feature_id,
        };
        txn.tables_mut().library_feature_links.push(link);
        txn.fetch_mut::<Library>(library_id)?.num_features += 1;

        Ok(link)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteLibraryFeatureLink {
    pub library_id: Uuid,
    pub feature_id: Uuid,
}

impl Write for DeleteLibraryFeatureLink {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self {
            library_id,
            feature_id,
        } = self;

        txn.fetch::<Library>(library_id)?;
        txn.fetch::<Feature>(feature_id)?;

        let position = txn
            .tables()
            .library_feature_links
            .iter()
            .position(|link| link.library_id == library_id && link.feature_id == feature_id)
            .ok_or_else(|| {
                Error::link_does_not_exist("library", library_id, "feature", feature_id)
            })?;
        txn.tables_mut().library_feature_links.remove(position);

        txn.fetch_mut::<Library>(library_id)?.num_features -= 1;

        Ok(())
    }
}
