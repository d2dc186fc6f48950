use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    FetchByQuery, Paged, Pagination, Write, error,
    error::Error,
    model::{
        contact::Contact,
        library::{DeleteLibrary, Library},
        pool,
        pool::Pool,
        sample::Sample,
        status,
        status::{DeliveryStatus, LibraryStatus, PoolStatus, SampleStatus, SeqRequestStatus},
        user::User,
    },
    store::Transaction,
    util::{paginate, rank_by_similarity},
};

/// A client's ask to have libraries sequenced. The request owns the
/// cascade: submitting or processing it moves every linked sample, library
/// and pool along with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqRequest {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: SeqRequestStatus,
    pub requestor_id: Uuid,
    pub billing_contact_id: Uuid,
    pub contact_person_id: Uuid,
    pub organization_contact_id: Uuid,
    pub bioinformatician_contact_id: Option<Uuid>,
    pub billing_code: Option<String>,
    pub num_libraries: i64,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// One address the finished data should be announced to, with its own
/// delivery state. Unique per (request, email).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEmail {
    pub seq_request_id: Uuid,
    pub email: String,
    pub status: DeliveryStatus,
}

impl DeliveryEmail {
    #[must_use]
    pub fn for_request(txn: &Transaction, seq_request_id: Uuid) -> Vec<Self> {
        txn.tables()
            .delivery_emails
            .iter()
            .filter(|link| link.seq_request_id == seq_request_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewSeqRequest {
    #[garde(length(min = 1, max = 128))]
    pub name: String,
    pub description: Option<String>,
    pub requestor_id: Uuid,
    pub billing_contact_id: Uuid,
    pub contact_person_id: Uuid,
    pub organization_contact_id: Uuid,
    pub bioinformatician_contact_id: Option<Uuid>,
    #[garde(inner(length(min = 1, max = 32)))]
    pub billing_code: Option<String>,
}

impl Write for NewSeqRequest {
    type Returns = SeqRequest;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;

        let requestor_email = txn.fetch::<User>(self.requestor_id)?.email.clone();

        for contact_id in [
            self.billing_contact_id,
            self.contact_person_id,
            self.organization_contact_id,
        ] {
            txn.fetch::<Contact>(contact_id)?;
        }

        let bioinformatician_email = match self.bioinformatician_contact_id {
            Some(contact_id) => txn.fetch::<Contact>(contact_id)?.email.clone(),
            None => None,
        };

        let request = SeqRequest {
            id: Uuid::now_v7(),
            name: self.name.trim().to_string(),
            description: self.description,
            status: SeqRequestStatus::Draft,
            requestor_id: self.requestor_id,
            billing_contact_id: self.billing_contact_id,
            contact_person_id: self.contact_person_id,
            organization_contact_id: self.organization_contact_id,
            bioinformatician_contact_id: self.bioinformatician_contact_id,
            billing_code: self.billing_code,
            num_libraries: 0,
            submitted_at: None,
        };

        txn.fetch_mut::<User>(self.requestor_id)?.num_seq_requests += 1;
        txn.insert(request.clone());

        // The requestor always hears about their data; the bioinformatician
        // does too when they have an address of their own.
        let mut delivery_emails = vec![requestor_email];
        if let Some(email) = bioinformatician_email {
            if !delivery_emails.contains(&email) {
                delivery_emails.push(email);
            }
        }
        for email in delivery_emails {
            txn.tables_mut().delivery_emails.push(DeliveryEmail {
                seq_request_id: request.id,
                email,
                status: DeliveryStatus::Pending,
            });
        }

        Ok(request)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct NewDeliveryEmail {
    pub seq_request_id: Uuid,
    #[garde(email)]
    pub email: String,
}

impl Write for NewDeliveryEmail {
    type Returns = DeliveryEmail;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        self.validate()?;
        txn.fetch::<SeqRequest>(self.seq_request_id)?;

        let already_linked = txn
            .tables()
            .delivery_emails
            .iter()
            .any(|link| link.seq_request_id == self.seq_request_id && link.email == self.email);
        if already_linked {
            return Err(Error::link_already_exists(
                "seq_request",
                self.seq_request_id,
                "delivery_email",
                &self.email,
            ));
        }

        let link = DeliveryEmail {
            seq_request_id: self.seq_request_id,
            email: self.email,
            status: DeliveryStatus::Pending,
        };
        txn.tables_mut().delivery_emails.push(link.clone());

        Ok(link)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteDeliveryEmail {
    pub seq_request_id: Uuid,
    pub email: String,
}

impl Write for DeleteDeliveryEmail {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        txn.fetch::<SeqRequest>(self.seq_request_id)?;

        let position = txn
            .tables()
            .delivery_emails
            .iter()
            .position(|link| link.seq_request_id == self.seq_request_id && link.email == self.email)
            .ok_or_else(|| {
                Error::link_does_not_exist(
                    "seq_request",
                    self.seq_request_id,
                    "delivery_email",
                    &self.email,
                )
            })?;
        txn.tables_mut().delivery_emails.remove(position);

        Ok(())
    }
}

fn request_library_ids(txn: &Transaction, seq_request_id: Uuid) -> Vec<Uuid> {
    txn.iter::<Library>()
        .filter(|library| library.seq_request_id == Some(seq_request_id))
        .map(|library| library.id)
        .collect()
}

fn request_sample_ids(txn: &Transaction, library_ids: &[Uuid]) -> BTreeSet<Uuid> {
    txn.tables()
        .sample_library_links
        .iter()
        .filter(|link| library_ids.contains(&link.library_id))
        .map(|link| link.sample_id)
        .collect()
}

fn request_pool_ids(txn: &Transaction, seq_request_id: Uuid) -> Vec<Uuid> {
    txn.iter::<Pool>()
        .filter(|pool| pool.seq_request_id == Some(seq_request_id))
        .map(|pool| pool.id)
        .collect()
}

/// Every library linked to the sample, across all requests, has to be
/// pooled before the sample counts as prepared.
fn sample_is_prepared(txn: &Transaction, sample_id: Uuid) -> bool {
    txn.tables()
        .sample_library_links
        .iter()
        .filter(|link| link.sample_id == sample_id)
        .all(|link| txn.linked::<Library>(link.library_id).pool_id.is_some())
}

/// Draft → Submitted. Libraries and samples still in Draft follow; pools
/// are always advanced on submission regardless of their prior state.
#[derive(Debug, Clone, Copy)]
pub struct SubmitSeqRequest {
    pub seq_request_id: Uuid,
}

impl Write for SubmitSeqRequest {
    type Returns = SeqRequest;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let request = txn.fetch::<SeqRequest>(self.seq_request_id)?;
        let new_status = status::transition(request.status, SeqRequestStatus::Submitted)?;

        tracing::info!(seq_request_id = %self.seq_request_id, "submitting seq request");

        let request = txn.fetch_mut::<SeqRequest>(self.seq_request_id)?;
        request.status = new_status;
        request.submitted_at = Some(Utc::now());
        let request = request.clone();

        let library_ids = request_library_ids(txn, self.seq_request_id);
        for library_id in &library_ids {
            let library = txn.linked_mut::<Library>(*library_id);
            if library.status == LibraryStatus::Draft {
                library.status = LibraryStatus::Submitted;
            }
        }

        for sample_id in request_sample_ids(txn, &library_ids) {
            let sample = txn.linked_mut::<Sample>(sample_id);
            if sample.status == SampleStatus::Draft {
                sample.status = SampleStatus::Submitted;
            }
        }

        for pool_id in request_pool_ids(txn, self.seq_request_id) {
            txn.linked_mut::<Pool>(pool_id).status = PoolStatus::Submitted;
        }

        Ok(request)
    }
}

/// Staff decision on a submitted request. Only Accepted, Draft and
/// Rejected are processable targets; acceptance re-derives the Pooled and
/// Prepared statuses, the other two cascade uniformly.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSeqRequest {
    pub seq_request_id: Uuid,
    pub status: SeqRequestStatus,
}

impl Write for ProcessSeqRequest {
    type Returns = SeqRequest;

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let (sample_status, library_status, pool_status) = match self.status {
            SeqRequestStatus::Accepted => (
                SampleStatus::Accepted,
                LibraryStatus::Accepted,
                PoolStatus::Accepted,
            ),
            SeqRequestStatus::Draft => {
                (SampleStatus::Draft, LibraryStatus::Draft, PoolStatus::Draft)
            }
            SeqRequestStatus::Rejected => (
                SampleStatus::Rejected,
                LibraryStatus::Rejected,
                PoolStatus::Rejected,
            ),
            SeqRequestStatus::Submitted => {
                return Err(Error::invalid_value(
                    "a seq request cannot be processed to submitted",
                ));
            }
        };

        let request = txn.fetch::<SeqRequest>(self.seq_request_id)?;
        let new_status = status::transition(request.status, self.status)?;
        txn.fetch_mut::<SeqRequest>(self.seq_request_id)?.status = new_status;

        tracing::info!(
            seq_request_id = %self.seq_request_id,
            status = %self.status,
            "processing seq request"
        );

        let accepted = self.status == SeqRequestStatus::Accepted;
        let library_ids = request_library_ids(txn, self.seq_request_id);

        for sample_id in request_sample_ids(txn, &library_ids) {
            let derived = if accepted && sample_is_prepared(txn, sample_id) {
                SampleStatus::Prepared
            } else {
                sample_status
            };
            txn.linked_mut::<Sample>(sample_id).status = derived;
        }

        for library_id in library_ids {
            let pooled = txn.linked::<Library>(library_id).pool_id.is_some();
            let derived = if accepted && pooled {
                LibraryStatus::Pooled
            } else {
                library_status
            };
            txn.linked_mut::<Library>(library_id).status = derived;
        }

        for pool_id in request_pool_ids(txn, self.seq_request_id) {
            txn.linked_mut::<Pool>(pool_id).status = pool_status;
        }

        Ok(txn.fetch::<SeqRequest>(self.seq_request_id)?.clone())
    }
}

/// Removes the request and everything that exists only for its sake: its
/// libraries (with their own cascades), its exclusive pools, its delivery
/// emails, and contacts no other request references.
#[derive(Debug, Clone, Copy)]
pub struct DeleteSeqRequest {
    pub seq_request_id: Uuid,
}

impl Write for DeleteSeqRequest {
    type Returns = ();

    fn write(self, txn: &mut Transaction) -> error::Result<Self::Returns> {
        let request = txn.fetch::<SeqRequest>(self.seq_request_id)?.clone();
        tracing::info!(seq_request_id = %self.seq_request_id, "deleting seq request");

        for library_id in request_library_ids(txn, self.seq_request_id) {
            DeleteLibrary { id: library_id }.write(txn)?;
        }

        for pool_id in request_pool_ids(txn, self.seq_request_id) {
            pool::delete_pool_record(txn, pool_id)?;
        }

        txn.linked_mut::<User>(request.requestor_id).num_seq_requests -= 1;

        txn.tables_mut()
            .delivery_emails
            .retain(|link| link.seq_request_id != self.seq_request_id);
        txn.remove::<SeqRequest>(self.seq_request_id)?;

        let mut contact_ids = vec![
            request.billing_contact_id,
            request.contact_person_id,
            request.organization_contact_id,
        ];
        contact_ids.extend(request.bioinformatician_contact_id);
        contact_ids.sort_unstable();
        contact_ids.dedup();

        for contact_id in contact_ids {
            let referenced = txn.iter::<SeqRequest>().any(|other| {
                other.billing_contact_id == contact_id
                    || other.contact_person_id == contact_id
                    || other.organization_contact_id == contact_id
                    || other.bioinformatician_contact_id == Some(contact_id)
            });
            if !referenced {
                txn.remove::<Contact>(contact_id)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeqRequestQuery {
    pub ids: Vec<Uuid>,
    pub name: Option<String>,
    pub requestor_id: Option<Uuid>,
    pub status_in: Vec<SeqRequestStatus>,
    pub pagination: Option<Pagination>,
}

impl FetchByQuery for SeqRequest {
    type QueryParams = SeqRequestQuery;

    fn fetch_by_query(query: &Self::QueryParams, txn: &Transaction) -> error::Result<Paged<Self>> {
        let SeqRequestQuery {
            ids,
            name,
            requestor_id,
            status_in,
            pagination,
        } = query;

        let name = name.as_ref().map(|n| n.to_lowercase());

        let mut records: Vec<SeqRequest> = txn
            .iter::<SeqRequest>()
            .filter(|r| ids.is_empty() || ids.contains(&r.id))
            .filter(|r| requestor_id.is_none_or(|requestor| r.requestor_id == requestor))
            .filter(|r| status_in.is_empty() || status_in.contains(&r.status))
            .filter(|r| {
                name.as_ref()
                    .is_none_or(|name| r.name.to_lowercase().contains(name))
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

impl SeqRequest {
    #[must_use]
    pub fn search_by_name(txn: &Transaction, word: &str, limit: Option<usize>) -> Vec<Self> {
        let requests: Vec<Self> = txn.iter::<Self>().cloned().collect();

        rank_by_similarity(requests, word, |r| r.name.as_str(), limit)
    }
}
