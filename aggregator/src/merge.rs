use indexmap::IndexSet;
use std::collections::HashSet;
use std::time::Duration;
use tender_protocol::ContractId;
use tender_protocol::Supplier;
use tender_protocol::TenderRecord;
use time::OffsetDateTime;

/// Clock readings for one merge, taken by the caller so `merge` stays pure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeStamp {
    pub now: OffsetDateTime,
    /// Time since the candidate was submitted.
    pub elapsed: Duration,
}

impl MergeStamp {
    pub fn new(now: OffsetDateTime, elapsed: Duration) -> Self {
        Self { now, elapsed }
    }
}

/// Combine the stored record for `key` (if any) with a new observation.
///
/// Scalars the observation carries replace stored ones; absent scalars keep
/// the stored value. Suppliers, categories and provenance accumulate.
pub fn merge(
    existing: Option<&TenderRecord>,
    incoming: TenderRecord,
    key: &ContractId,
    stamp: MergeStamp,
) -> TenderRecord {
    let mut merged = existing.cloned().unwrap_or_default();
    let previous_stamp = merged.last_processed;

    let TenderRecord {
        contract_id: _,
        title,
        link,
        status,
        body_name,
        opened_at,
        closed_at,
        description,
        contact_name,
        contact_email,
        started_at,
        expired_at,
        contract_value,
        number_of_submissions,
        comment,
        reason,
        source_page,
        last_updated,
        suppliers,
        categories,
        provenance,
        last_processed: _,
        processing_time: _,
        extra,
    } = incoming;

    overwrite(&mut merged.title, title);
    overwrite(&mut merged.link, link);
    overwrite(&mut merged.status, status);
    overwrite(&mut merged.body_name, body_name);
    overwrite(&mut merged.opened_at, opened_at);
    overwrite(&mut merged.closed_at, closed_at);
    overwrite(&mut merged.description, description);
    overwrite(&mut merged.contact_name, contact_name);
    overwrite(&mut merged.contact_email, contact_email);
    overwrite(&mut merged.started_at, started_at);
    overwrite(&mut merged.expired_at, expired_at);
    overwrite(&mut merged.contract_value, contract_value);
    overwrite(&mut merged.number_of_submissions, number_of_submissions);
    overwrite(&mut merged.comment, comment);
    overwrite(&mut merged.reason, reason);
    overwrite(&mut merged.source_page, source_page);
    overwrite(&mut merged.last_updated, last_updated);

    merged.extra.extend(extra.into_iter().filter(|(_, value)| !value.is_null()));
    merged.suppliers = union_suppliers(merged.suppliers.take(), suppliers);
    merged.categories = union_categories(merged.categories.take(), categories);
    merged.provenance.extend(provenance);

    merged.contract_id = key.as_str().to_string();
    merged.last_processed = Some(match previous_stamp {
        Some(previous) if previous > stamp.now => previous,
        _ => stamp.now,
    });
    merged.processing_time = Some(u64::try_from(stamp.elapsed.as_millis()).unwrap_or(u64::MAX));
    merged
}

fn overwrite<T>(slot: &mut Option<T>, observed: Option<T>) {
    if observed.is_some() {
        *slot = observed;
    }
}

/// Existing suppliers first, then new ones; the first entry per name wins.
/// Unnamed entries share the empty name, so only the first of them is kept.
fn union_suppliers(
    existing: Option<Vec<Supplier>>,
    incoming: Option<Vec<Supplier>>,
) -> Option<Vec<Supplier>> {
    if existing.is_none() && incoming.is_none() {
        return None;
    }
    let mut seen = HashSet::new();
    Some(
        existing
            .into_iter()
            .chain(incoming)
            .flatten()
            .filter(|supplier| seen.insert(supplier.supplier_name.clone()))
            .collect(),
    )
}

fn union_categories(
    existing: Option<Vec<String>>,
    incoming: Option<Vec<String>>,
) -> Option<Vec<String>> {
    if existing.is_none() && incoming.is_none() {
        return None;
    }
    let union: IndexSet<String> = existing
        .into_iter()
        .chain(incoming)
        .flatten()
        .filter(|category| !category.is_empty())
        .collect();
    Some(union.into_iter().collect())
}
