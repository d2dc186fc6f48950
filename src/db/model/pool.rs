use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreOptions;
use crate::db::{
    Write, error,
    model::{experiment, status::PoolStatus, user::User},
    store::Transaction,
};

/// Grams per mole of a DNA base pair, used to convert a Qubit reading and
/// an average fragment size into molarity.
pub(crate) const BP_MOLAR_MASS: f64 = 660.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MolarityLevel {
    Nominal,
    Borderline,
    Critical,
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn molarity(
    qubit_concentration: Option<f64>,
    fragment_size_bp: Option<i64>,
) -> Option<f64> {
    let (qubit, size) = (qubit_concentration?, fragment_size_bp?);

    Some(qubit / (size as f64 * BP_MOLAR_MASS) * 1_000_000.0)
}

pub(crate) fn molarity_level(molarity: f64, options: &StoreOptions) -> MolarityLevel {
    if molarity < options.error_min_molarity || options.error_max_molarity < molarity {
        MolarityLevel::Critical
    } else if molarity < options.warning_min_molarity || options.warning_max_molarity < molarity {
        MolarityLevel::Borderline
    } else {
        MolarityLevel::Nominal
    }
}

/// A combination of libraries prepared together for lane loading. An empty
/// pool is never kept around: whichever coordinated operation removes the
/// last library also removes the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: Uuid,
    pub name: String,
    pub status: PoolStatus,
    pub owner_id: Uuid,
    pub seq_request_id: Option<Uuid>,
    pub num_libraries: i64,
    pub num_m_reads_requested: Option<f64>,
    pub avg_library_size_bp: Option<i64>,
    pub original_qubit_concentration: Option<f64>,
    pub diluted_qubit_concentration: Option<f64>,
}

impl Pool {
    #[must_use]
    pub fn original_molarity(&self) -> Option<f64> {
        molarity(self.original_qubit_concentration, self.avg_library_size_bp)
    }

    #[must_use]
    pub fn diluted_molarity(&self) -> Option<f64> {
        molarity(self.diluted_qubit_concentration, self.avg_library_size_bp)
    }

    /// The dilution supersedes the original measurement once present.
    #[must_use]
    pub fn molarity(&self) -> Option<f64> {
        if self.diluted_qubit_concentration.is_some() {
            self.diluted_molarity()
        } else {
            self.original_molarity()
        }
    }

    #[must_use]
    pub fn molarity_level(&self, options: &StoreOptions) -> Option<MolarityLevel> {
        self.molarity().map(|m| molarity_level(m, options))
    }

    #[must_use]
    pub fn is_qced(&self) -> bool {
        self.original_qubit_concentration.is_some() && self.avg_library_size_bp.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewPool {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    pub owner_id: Uuid,
    pub seq_request_id: Option<Uuid>,
    pub num_m_reads_requested: Option<f64>,
    pub avg_library_size_bp: Option<i64>,
    pub original_qubit_concentration: Option<f64>,
    pub diluted_qubit_concentration: Option<f64>,
}

impl Write for NewPool {
    type Returns = Pool;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;
        txn.fetch::<User>(self.owner_id)?;

        if let Some(seq_request_id) = self.seq_request_id {
            txn.fetch::<super::request::SeqRequest>(seq_request_id)?;
        }

        let pool = Pool {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            status: PoolStatus::Draft,
            owner_id: self.owner_id,
            seq_request_id: self.seq_request_id,
            num_libraries: 0,
            num_m_reads_requested: self.num_m_reads_requested,
            avg_library_size_bp: self.avg_library_size_bp,
            original_qubit_concentration: self.original_qubit_concentration,
            diluted_qubit_concentration: self.diluted_qubit_concentration,
        };
        txn.insert(pool.clone());

        Ok(pool)
    }
}

/// Removes a pool row along with its lane links, keeping the affected
/// experiments' library counters truthful.
pub(crate) fn delete_pool_record(txn: &mut Transaction, pool_id: Uuid) -> error::Result<()> {
    let affected_experiments: Vec<Uuid> = txn
        .tables()
        .lane_pool_links
        .iter()
        .filter(|link| link.pool_id == pool_id)
        .map(|link| {
            txn.linked::<experiment::Lane>(link.lane_id).experiment_id
        })
        .collect();

    txn.tables_mut()
        .lane_pool_links
        .retain(|link| link.pool_id != pool_id);
    txn.remove::<Pool>(pool_id)?;

    for experiment_id in affected_experiments {
        experiment::refresh_experiment(txn, experiment_id);
    }

    Ok(())
}
