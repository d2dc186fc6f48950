use uuid::Uuid;

use crate::db::{
    Write,
    model::{
        contact::NewContact,
        experiment::{NewExperiment, NewLane, NewLanePoolLink},
        feature::NewFeature,
        library::{DnaSequence, IndexAssignment, Library, LibraryType, NewLibrary, PoolLibrary},
        link::NewSampleLibraryLink,
        pool::NewPool,
        request::NewSeqRequest,
        sample::NewSample,
        user::NewUser,
    },
    store::Store,
};

pub(crate) struct RequestScenario {
    pub owner_id: Uuid,
    pub seq_request_id: Uuid,
    pub billing_contact_id: Uuid,
    pub contact_person_id: Uuid,
    pub organization_contact_id: Uuid,
}

pub(crate) struct LinkedScenario {
    pub owner_id: Uuid,
    pub seq_request_id: Uuid,
    pub billing_contact_id: Uuid,
    pub contact_person_id: Uuid,
    pub organization_contact_id: Uuid,
    pub sample_id: Uuid,
    pub library_id: Uuid,
}

pub(crate) struct FlowCellScenario {
    pub experiment_id: Uuid,
    pub lane_id: Uuid,
    pub pool_id: Uuid,
    pub library_a: Uuid,
    pub library_b: Uuid,
}

pub(crate) fn seed_user(store: &Store, name: &str) -> Uuid {
    store
        .transaction(|txn| {
            NewUser {
                name: name.to_string(),
                email: format!("{name}@example.com"),
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_contact(store: &Store, name: &str) -> Uuid {
    store
        .transaction(|txn| {
            NewContact {
                name: name.to_string(),
                email: Some(format!("{name}@example.com")),
                ..Default::default()
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_request_with_contacts(
    store: &Store,
    requestor_id: Uuid,
    billing_contact_id: Uuid,
) -> Uuid {
    let contact_person_id = seed_contact(store, "contact-person");
    let organization_contact_id = seed_contact(store, "organization");

    store
        .transaction(|txn| {
            NewSeqRequest {
                name: "another request".to_string(),
                description: None,
                requestor_id,
                billing_contact_id,
                contact_person_id,
                organization_contact_id,
                bioinformatician_contact_id: None,
                billing_code: None,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

/// A user plus a draft request wired to three dedicated contacts.
pub(crate) fn request_scenario(store: &Store) -> RequestScenario {
    let owner_id = seed_user(store, "requestor");
    let billing_contact_id = seed_contact(store, "billing");
    let contact_person_id = seed_contact(store, "person");
    let organization_contact_id = seed_contact(store, "org");

    let seq_request_id = store
        .transaction(|txn| {
            NewSeqRequest {
                name: "smith lab run 1".to_string(),
                description: Some("10x scRNA-seq".to_string()),
                requestor_id: owner_id,
                billing_contact_id,
                contact_person_id,
                organization_contact_id,
                bioinformatician_contact_id: None,
                billing_code: Some("BC-001".to_string()),
            }
            .write(txn)
        })
        .unwrap()
        .id;

    RequestScenario {
        owner_id,
        seq_request_id,
        billing_contact_id,
        contact_person_id,
        organization_contact_id,
    }
}

pub(crate) fn seed_sample(store: &Store, owner_id: Uuid, name: &str) -> Uuid {
    store
        .transaction(|txn| {
            NewSample {
                name: name.to_string(),
                organism_tax_id: 9606,
                owner_id,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_library(
    store: &Store,
    owner_id: Uuid,
    seq_request_id: Option<Uuid>,
    name: &str,
) -> Uuid {
    store
        .transaction(|txn| {
            NewLibrary {
                name: name.to_string(),
                library_type: LibraryType::ScRnaSeq,
                owner_id,
                seq_request_id,
                pool_id: None,
                index_kit_id: None,
                index: IndexAssignment::default(),
                volume_ul: None,
                dna_concentration: None,
                total_size_bp: None,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_pool(
    store: &Store,
    owner_id: Uuid,
    seq_request_id: Option<Uuid>,
    name: &str,
) -> Uuid {
    store
        .transaction(|txn| {
            NewPool {
                name: name.to_string(),
                owner_id,
                seq_request_id,
                num_m_reads_requested: None,
                avg_library_size_bp: Some(420),
                original_qubit_concentration: Some(2.4),
                diluted_qubit_concentration: None,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_pool_for_request(store: &Store, owner_id: Uuid, seq_request_id: Uuid) -> Uuid {
    seed_pool(store, owner_id, Some(seq_request_id), "request-pool")
}

pub(crate) fn seed_feature(store: &Store, name: &str, kit_id: Option<Uuid>) -> Uuid {
    store
        .transaction(|txn| {
            NewFeature {
                name: name.to_string(),
                kit_id,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn seed_experiment(store: &Store, name: &str, num_lanes: i32) -> Uuid {
    store
        .transaction(|txn| {
            NewExperiment {
                name: name.to_string(),
                num_lanes,
            }
            .write(txn)
        })
        .unwrap()
        .id
}

pub(crate) fn single_index(sequence: &str) -> IndexAssignment {
    IndexAssignment {
        sequences: [Some(DnaSequence(sequence.to_string())), None, None, None],
        adapter: None,
    }
}

/// The request scenario extended with one sample linked to one library.
pub(crate) fn linked_scenario(store: &Store) -> LinkedScenario {
    let request = request_scenario(store);
    let sample_id = seed_sample(store, request.owner_id, "s1");
    let library_id = seed_library(store, request.owner_id, Some(request.seq_request_id), "l1");

    store
        .transaction(|txn| {
            NewSampleLibraryLink {
                sample_id,
                library_id,
                mux_tag: None,
            }
            .write(txn)
        })
        .unwrap();

    LinkedScenario {
        owner_id: request.owner_id,
        seq_request_id: request.seq_request_id,
        billing_contact_id: request.billing_contact_id,
        contact_person_id: request.contact_person_id,
        organization_contact_id: request.organization_contact_id,
        sample_id,
        library_id,
    }
}

/// One single-lane experiment whose lane carries a pool of two indexed
/// libraries, QC'd well enough for the loading math to go through.
pub(crate) fn flow_cell_scenario(store: &Store) -> FlowCellScenario {
    let owner_id = seed_user(store, "operator");
    let experiment_id = seed_experiment(store, "exp-1", 1);
    let pool_id = seed_pool(store, owner_id, None, "pool-1");

    let library_a = seed_library(store, owner_id, None, "l1");
    let library_b = seed_library(store, owner_id, None, "l2");
    store
        .transaction(|txn| {
            txn.fetch_mut::<Library>(library_a)?.index = single_index("ACGTACGT");
            txn.fetch_mut::<Library>(library_b)?.index = single_index("TGCATGCA");
            Ok(())
        })
        .unwrap();

    for library_id in [library_a, library_b] {
        store
            .transaction(|txn| {
                PoolLibrary {
                    library_id,
                    pool_id,
                }
                .write(txn)
            })
            .unwrap();
    }

    let lane_id = store
        .transaction(|txn| {
            NewLane {
                experiment_id,
                number: 1,
                avg_fragment_size_bp: Some(450),
                original_qubit_concentration: Some(2.2),
            }
            .write(txn)
        })
        .unwrap()
        .id;

    store
        .transaction(|txn| NewLanePoolLink { lane_id, pool_id }.write(txn))
        .unwrap();

    FlowCellScenario {
        experiment_id,
        lane_id,
        pool_id,
        library_a,
        library_b,
    }
}
