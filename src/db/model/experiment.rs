use std::collections::BTreeSet;

use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::barcode::{IndexRow, check_indices};
use crate::db::{
    Write, error,
    error::Error,
    model::{
        library::Library,
        pool,
        pool::Pool,
        status,
        status::ExperimentStatus,
    },
    store::Transaction,
};

/// A sequencing run definition with a fixed number of lanes declared up
/// front. Lanes are created one by one but can never exceed that count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Uuid,
    pub name: String,
    pub status: ExperimentStatus,
    pub num_lanes: i32,
    pub num_libraries: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewExperiment {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    #[garde(range(min = 1, max = 8))]
    pub num_lanes: i32,
}

impl Write for NewExperiment {
    type Returns = Experiment;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let experiment = Experiment {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            status: ExperimentStatus::Draft,
            num_lanes: self.num_lanes,
            num_libraries: 0,
        };
        txn.insert(experiment.clone());

        Ok(experiment)
    }
}

/// One physical lane slot on the flow cell, holding the measurements the
/// loading calculation works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub number: i32,
    pub avg_fragment_size_bp: Option<i64>,
    pub original_qubit_concentration: Option<f64>,
    pub sequencing_qubit_concentration: Option<f64>,
    pub target_molarity: Option<f64>,
    pub total_volume_ul: Option<f64>,
    pub library_volume_ul: Option<f64>,
}

impl Lane {
    #[must_use]
    pub fn original_molarity(&self) -> Option<f64> {
        pool::molarity(self.original_qubit_concentration, self.avg_fragment_size_bp)
    }

    #[must_use]
    pub fn sequencing_molarity(&self) -> Option<f64> {
        pool::molarity(
            self.sequencing_qubit_concentration,
            self.avg_fragment_size_bp,
        )
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewLane {
    pub experiment_id: Uuid,
    pub number: i32,
    pub avg_fragment_size_bp: Option<i64>,
    pub original_qubit_concentration: Option<f64>,
}

impl Write for NewLane {
    type Returns = Lane;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let experiment = txn.fetch::<Experiment>(self.experiment_id)?;

        if self.number < 1 || self.number > experiment.num_lanes {
            return Err(Error::invalid_value(format!(
                "experiment {} has only {} lanes",
                self.experiment_id, experiment.num_lanes
            )));
        }

        let taken = txn
            .iter::<Lane>()
            .any(|lane| lane.experiment_id == self.experiment_id && lane.number == self.number);
        if taken {
            return Err(Error::link_already_exists(
                "experiment",
                self.experiment_id,
                "lane",
                self.number,
            ));
        }

        let lane = Lane {
            id: Uuid::now_v7(),
            experiment_id: self.experiment_id,
            number: self.number,
            avg_fragment_size_bp: self.avg_fragment_size_bp,
            original_qubit_concentration: self.original_qubit_concentration,
            sequencing_qubit_concentration: None,
            target_molarity: None,
            total_volume_ul: None,
            library_volume_ul: None,
        };
        txn.insert(lane.clone());

        Ok(lane)
    }
}

/// Join row between a lane and a pool loaded onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanePoolLink {
    pub lane_id: Uuid,
    pub pool_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct NewLanePoolLink {
    pub lane_id: Uuid,
    pub pool_id: Uuid,
}

impl Write for NewLanePoolLink {
    type Returns = LanePoolLink;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self { lane_id, pool_id } = self;

        let experiment_id = txn.fetch::<Lane>(lane_id)?.experiment_id;
        txn.fetch::<Pool>(pool_id)?;

        let already_linked = txn
            .tables()
            .lane_pool_links
            .iter()
            .any(|link| link.lane_id == lane_id && link.pool_id == pool_id);
        if already_linked {
            return Err(Error::link_already_exists("lane", lane_id, "pool", pool_id));
        }

        let link = LanePoolLink { lane_id, pool_id };
        txn.tables_mut().lane_pool_links.push(link);
        refresh_experiment(txn, experiment_id);

        Ok(link)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteLanePoolLink {
    pub lane_id: Uuid,
    pub pool_id: Uuid,
}

impl Write for DeleteLanePoolLink {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let Self { lane_id, pool_id } = self;

        let experiment_id = txn.fetch::<Lane>(lane_id)?.experiment_id;
        txn.fetch::<Pool>(pool_id)?;

        let position = txn
            .tables()
            .lane_pool_links
            .iter()
            .position(|link| link.lane_id == lane_id && link.pool_id == pool_id)
            .ok_or_else(|| Error::link_does_not_exist("lane", lane_id, "pool", pool_id))?;
        txn.tables_mut().lane_pool_links.remove(position);

        refresh_experiment(txn, experiment_id);

        Ok(())
    }
}

/// Recomputes the experiment's library counter from its lane-pool links.
/// The counter is a cache of that sum; this is its only writer.
pub(crate) fn refresh_experiment(txn: &mut Transaction, experiment_id: Uuid) {
    let lane_ids: BTreeSet<Uuid> = txn
        .iter::<Lane>()
        .filter(|lane| lane.experiment_id == experiment_id)
        .map(|lane| lane.id)
        .collect();

    let total: i64 = txn
        .tables()
        .lane_pool_links
        .iter()
        .filter(|link| lane_ids.contains(&link.lane_id))
        .map(|link| txn.linked::<Pool>(link.pool_id).num_libraries)
        .sum();

    txn.linked_mut::<Experiment>(experiment_id).num_libraries = total;
}

pub(crate) fn refresh_experiments_for_pool(txn: &mut Transaction, pool_id: Uuid) {
    let experiment_ids: BTreeSet<Uuid> = txn
        .tables()
        .lane_pool_links
        .iter()
        .filter(|link| link.pool_id == pool_id)
        .map(|link| txn.linked::<Lane>(link.lane_id).experiment_id)
        .collect();

    for experiment_id in experiment_ids {
        refresh_experiment(txn, experiment_id);
    }
}

#[must_use]
pub fn lanes_of(txn: &Transaction, experiment_id: Uuid) -> Vec<Lane> {
    let mut lanes: Vec<Lane> = txn
        .iter::<Lane>()
        .filter(|lane| lane.experiment_id == experiment_id)
        .cloned()
        .collect();
    lanes.sort_by_key(|lane| lane.number);

    lanes
}

/// Snapshot of every library headed for the experiment's lanes, in the
/// shape the barcode checker consumes.
pub fn index_rows(txn: &Transaction, experiment_id: Uuid) -> error::Result<Vec<IndexRow>> {
    txn.fetch::<Experiment>(experiment_id)?;

    let mut rows = Vec::new();
    for lane in lanes_of(txn, experiment_id) {
        for link in &txn.tables().lane_pool_links {
            if link.lane_id != lane.id {
                continue;
            }

            for library in txn.iter::<Library>() {
                if library.pool_id == Some(link.pool_id) {
                    rows.push(IndexRow {
                        library_id: library.id,
                        library_name: library.name.clone(),
                        lane: lane.number,
                        indices: library.index.raw(),
                    });
                }
            }
        }
    }

    Ok(rows)
}

fn barcode_gate(txn: &Transaction, experiment_id: Uuid) -> error::Result<()> {
    let report = check_indices(&index_rows(txn, experiment_id)?);

    if report.passes() {
        Ok(())
    } else {
        Err(Error::invalid_value(format!(
            "experiment {experiment_id} has libraries with barcode errors"
        )))
    }
}

/// Writes the flow-cell loading measurements onto every lane and derives
/// each lane's loading volume. Refused outright while the barcode check
/// reports any hard error. The experiment reaches Loaded once every lane
/// has a computable volume.
#[derive(Debug, Clone, Copy)]
pub struct LoadLanes {
    pub experiment_id: Uuid,
    pub sequencing_qubit_concentration: Option<f64>,
    pub target_molarity: Option<f64>,
    pub total_volume_ul: Option<f64>,
}

impl Write for LoadLanes {
    type Returns = Experiment;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        txn.fetch::<Experiment>(self.experiment_id)?;
        barcode_gate(txn, self.experiment_id)?;

        let lanes = lanes_of(txn, self.experiment_id);
        let mut all_loaded = !lanes.is_empty();

        for lane in &lanes {
            let lane_molarity = lane.original_molarity();

            let lane = txn.linked_mut::<Lane>(lane.id);
            lane.sequencing_qubit_concentration = self.sequencing_qubit_concentration;
            lane.target_molarity = self.target_molarity;
            lane.total_volume_ul = self.total_volume_ul;

            match (lane_molarity, self.target_molarity, self.total_volume_ul) {
                (Some(molarity), Some(target), Some(volume)) => {
                    lane.library_volume_ul = Some(volume * target / molarity);
                }
                _ => {
                    lane.library_volume_ul = None;
                    all_loaded = false;
                }
            }
        }

        let experiment = txn.fetch_mut::<Experiment>(self.experiment_id)?;
        if all_loaded {
            experiment.status = ExperimentStatus::Loaded;
            tracing::info!(experiment_id = %self.experiment_id, "flow cell loaded");
        }

        Ok(experiment.clone())
    }
}

/// Loaded → Sequencing, re-running the barcode gate right before the run
/// becomes irreversible.
#[derive(Debug, Clone, Copy)]
pub struct StartSequencing {
    pub experiment_id: Uuid,
}

impl Write for StartSequencing {
    type Returns = Experiment;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        barcode_gate(txn, self.experiment_id)?;

        let experiment = txn.fetch::<Experiment>(self.experiment_id)?;
        let new_status = status::transition(experiment.status, ExperimentStatus::Sequencing)?;

        let experiment = txn.fetch_mut::<Experiment>(self.experiment_id)?;
        experiment.status = new_status;

        Ok(experiment.clone())
    }
}
