//! Walks one sequencing request through its whole life: intake, linking,
//! submission, acceptance, flow-cell loading and final teardown.

use pretty_assertions::assert_eq;
use uuid::Uuid;

use seqtrack::Store;
use seqtrack::db::{
    FetchById, FetchByQuery, Write,
    error::Error,
    model::{
        contact::{Contact, NewContact},
        experiment::{Experiment, Lane, LoadLanes, NewExperiment, NewLane, NewLanePoolLink, StartSequencing},
        library::{
            DnaSequence, IndexAssignment, Library, LibraryQuery, LibraryType, NewLibrary,
            PoolLibrary, UpdateLibrary,
        },
        link::NewSampleLibraryLink,
        pool::{NewPool, Pool},
        request::{DeleteSeqRequest, NewSeqRequest, ProcessSeqRequest, SeqRequest, SubmitSeqRequest},
        sample::{NewSample, Sample},
        status::{ExperimentStatus, LibraryStatus, SampleStatus, SeqRequestStatus},
        user::{NewUser, User},
    },
};

fn contact(name: &str) -> NewContact {
    NewContact {
        name: name.to_string(),
        email: Some(format!("{name}@example.org")),
        ..Default::default()
    }
}

fn library(name: &str, owner_id: Uuid, seq_request_id: Uuid, index_1: &str) -> NewLibrary {
    NewLibrary {
        name: name.to_string(),
        library_type: LibraryType::ScRnaSeq,
        owner_id,
        seq_request_id: Some(seq_request_id),
        pool_id: None,
        index_kit_id: None,
        index: IndexAssignment {
            sequences: [Some(DnaSequence(index_1.to_string())), None, None, None],
            adapter: Some("CTGTCTCTTATACACATCT".to_string()),
        },
        volume_ul: Some(30.0),
        dna_concentration: Some(4.5),
        total_size_bp: Some(450),
    }
}

#[test]
fn request_lifecycle_end_to_end() {
    let store = Store::new();

    // Intake: a requestor, their contacts, a draft request.
    let requestor = store
        .transaction(|txn| {
            NewUser {
                name: "Jerry Smith".to_string(),
                email: "jerry@example.org".to_string(),
            }
            .write(txn)
        })
        .unwrap();

    let (billing, person, organization) = store
        .transaction(|txn| {
            Ok((
                contact("billing").write(txn)?,
                contact("person").write(txn)?,
                contact("organization").write(txn)?,
            ))
        })
        .unwrap();

    let request = store
        .transaction(|txn| {
            NewSeqRequest {
                name: "smith lab scrna run".to_string(),
                description: None,
                requestor_id: requestor.id,
                billing_contact_id: billing.id,
                contact_person_id: person.id,
                organization_contact_id: organization.id,
                bioinformatician_contact_id: None,
                billing_code: Some("SM-42".to_string()),
            }
            .write(txn)
        })
        .unwrap();
    assert_eq!(request.status, SeqRequestStatus::Draft);

    // One multiplexed sample behind two libraries.
    let sample = store
        .transaction(|txn| {
            NewSample {
                name: "cortex biopsy".to_string(),
                organism_tax_id: 9606,
                owner_id: requestor.id,
            }
            .write(txn)
        })
        .unwrap();

    let (gex, atac) = store
        .transaction(|txn| {
            let gex = library("smith-gex", requestor.id, request.id, "ACGTACGTAC").write(txn)?;
            let atac = library("smith-atac", requestor.id, request.id, "TGCATGCATG").write(txn)?;

            for library_id in [gex.id, atac.id] {
                NewSampleLibraryLink {
                    sample_id: sample.id,
                    library_id,
                    mux_tag: None,
                }
                .write(txn)?;
            }

            Ok((gex, atac))
        })
        .unwrap();

    let request_now = store
        .view(|txn| SeqRequest::fetch_by_id(&request.id, txn))
        .unwrap();
    assert_eq!(request_now.num_libraries, 2);

    // Submission cascades Draft entities to Submitted.
    store
        .transaction(|txn| {
            SubmitSeqRequest {
                seq_request_id: request.id,
            }
            .write(txn)
        })
        .unwrap();
    store.view(|txn| {
        assert_eq!(
            Sample::fetch_by_id(&sample.id, txn).unwrap().status,
            SampleStatus::Submitted
        );
        assert_eq!(
            Library::fetch_by_id(&gex.id, txn).unwrap().status,
            LibraryStatus::Submitted
        );
    });

    // Pool both libraries, accept, and watch the derivations land.
    let pool = store
        .transaction(|txn| {
            NewPool {
                name: "smith-pool".to_string(),
                owner_id: requestor.id,
                seq_request_id: Some(request.id),
                num_m_reads_requested: Some(800.0),
                avg_library_size_bp: Some(460),
                original_qubit_concentration: Some(2.6),
                diluted_qubit_concentration: None,
            }
            .write(txn)
        })
        .unwrap();

    store
        .transaction(|txn| {
            for library_id in [gex.id, atac.id] {
                PoolLibrary {
                    library_id,
                    pool_id: pool.id,
                }
                .write(txn)?;
            }
            Ok(())
        })
        .unwrap();

    let accepted = store
        .transaction(|txn| {
            ProcessSeqRequest {
                seq_request_id: request.id,
                status: SeqRequestStatus::Accepted,
            }
            .write(txn)
        })
        .unwrap();
    assert_eq!(accepted.status, SeqRequestStatus::Accepted);

    store.view(|txn| {
        assert_eq!(
            Sample::fetch_by_id(&sample.id, txn).unwrap().status,
            SampleStatus::Prepared
        );
        for library_id in [gex.id, atac.id] {
            assert_eq!(
                Library::fetch_by_id(&library_id, txn).unwrap().status,
                LibraryStatus::Pooled
            );
        }
    });

    let pooled = store
        .view(|txn| {
            Library::fetch_by_query(
                &LibraryQuery {
                    pool_id: Some(pool.id),
                    ..Default::default()
                },
                txn,
            )
        })
        .unwrap();
    assert_eq!(pooled.records.len(), 2);

    // Load the flow cell. A barcode collision blocks it first.
    let experiment = store
        .transaction(|txn| {
            NewExperiment {
                name: "novaseq-07".to_string(),
                num_lanes: 1,
            }
            .write(txn)
        })
        .unwrap();
    let lane = store
        .transaction(|txn| {
            NewLane {
                experiment_id: experiment.id,
                number: 1,
                avg_fragment_size_bp: Some(460),
                original_qubit_concentration: Some(2.6),
            }
            .write(txn)
        })
        .unwrap();
    store
        .transaction(|txn| {
            NewLanePoolLink {
                lane_id: lane.id,
                pool_id: pool.id,
            }
            .write(txn)
        })
        .unwrap();

    let experiment_now = store
        .view(|txn| Experiment::fetch_by_id(&experiment.id, txn))
        .unwrap();
    assert_eq!(experiment_now.num_libraries, 2);

    let original_index = store
        .view(|txn| Library::fetch_by_id(&atac.id, txn))
        .unwrap()
        .index;
    let colliding_index = IndexAssignment {
        sequences: [Some(DnaSequence("ACGTACGTAC".to_string())), None, None, None],
        adapter: original_index.adapter.clone(),
    };
    store
        .transaction(|txn| {
            UpdateLibrary {
                id: atac.id,
                index: Some(colliding_index),
                ..Default::default()
            }
            .write(txn)
        })
        .unwrap();

    let load = LoadLanes {
        experiment_id: experiment.id,
        sequencing_qubit_concentration: Some(1.8),
        target_molarity: Some(2.0),
        total_volume_ul: Some(150.0),
    };
    let err = store.transaction(|txn| load.write(txn)).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    // Typed errors serialize with their tag, for the layers above.
    let serialized = serde_json::to_value(&err).unwrap();
    assert_eq!(serialized["type"], "invalid_value");

    store
        .transaction(|txn| {
            UpdateLibrary {
                id: atac.id,
                index: Some(original_index),
                ..Default::default()
            }
            .write(txn)
        })
        .unwrap();

    let loaded = store.transaction(|txn| load.write(txn)).unwrap();
    assert_eq!(loaded.status, ExperimentStatus::Loaded);

    let lane_now = store.view(|txn| Lane::fetch_by_id(&lane.id, txn)).unwrap();
    assert!(lane_now.library_volume_ul.is_some());

    let sequencing = store
        .transaction(|txn| {
            StartSequencing {
                experiment_id: experiment.id,
            }
            .write(txn)
        })
        .unwrap();
    assert_eq!(sequencing.status, ExperimentStatus::Sequencing);

    // Teardown: deleting the request takes its whole subgraph with it.
    store
        .transaction(|txn| {
            DeleteSeqRequest {
                seq_request_id: request.id,
            }
            .write(txn)
        })
        .unwrap();

    store.view(|txn| {
        assert_eq!(txn.iter::<SeqRequest>().count(), 0);
        assert_eq!(txn.iter::<Library>().count(), 0);
        assert_eq!(txn.iter::<Sample>().count(), 0);
        assert_eq!(txn.iter::<Pool>().count(), 0);
        assert_eq!(txn.iter::<Contact>().count(), 0);

        assert_eq!(
            User::fetch_by_id(&requestor.id, txn)
                .unwrap()
                .num_seq_requests,
            0
        );

        // The experiment record survives with its counter back at zero.
        let experiment = Experiment::fetch_by_id(&experiment.id, txn).unwrap();
        assert_eq!(experiment.num_libraries, 0);
    });
}

#[test]
fn missing_ids_surface_as_typed_errors() {
    let store = Store::new();

    let err = store
        .view(|txn| Sample::fetch_by_id(&Uuid::now_v7(), txn))
        .unwrap_err();

    let Error::ElementDoesNotExist { entity, .. } = &err else {
        panic!("expected ElementDoesNotExist, got {err:?}");
    };
    assert_eq!(entity, "sample");

    let serialized = serde_json::to_value(&err).unwrap();
    assert_eq!(serialized["type"], "element_does_not_exist");
}
