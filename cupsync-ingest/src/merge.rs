//! Keyed merge of fetched records into the archive
//!
//! Merge strategy: the remote API is authoritative for the name, publish
//! timestamp, source URL, and map list; the override sheet is authoritative
//! for the winner and display date; and a stored author that was already
//! resolved to a display name is never reverted by a re-fetch. Absence
//! never erases data.

use std::collections::HashSet;

use cupsync_common::model::{AuthorField, CampaignRecord, MapRecord};

use crate::services::overrides::{OverrideRow, OverrideTable};

/// What an upsert did to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The merged record was identical to the stored one
    Unchanged,
}

/// Upsert a freshly fetched record into the archive by edition.
///
/// The caller sorts and saves after the batch; a single upsert only
/// guarantees key uniqueness, not ordering.
pub fn upsert(
    store: &mut Vec<CampaignRecord>,
    mut fresh: CampaignRecord,
    overrides: &OverrideTable,
) -> UpsertOutcome {
    dedupe_maps(&mut fresh.maps);

    let row = overrides.get(&fresh.edition.to_string());
    match store.iter_mut().find(|r| r.edition == fresh.edition) {
        Some(existing) => {
            // Stored values beat the freshly fetched defaults; the sheet
            // beats both.
            fresh.winner = existing.winner.clone();
            fresh.display_date = existing.display_date.clone();
            if let Some(row) = row {
                apply_row(&mut fresh, row);
            }
            keep_resolved_authors(existing, &mut fresh.maps);

            if *existing == fresh {
                UpsertOutcome::Unchanged
            } else {
                *existing = fresh;
                UpsertOutcome::Replaced
            }
        }
        None => {
            if let Some(row) = row {
                apply_row(&mut fresh, row);
            }
            store.push(fresh);
            UpsertOutcome::Inserted
        }
    }
}

/// Offline pass: re-apply the override table to every archived record.
/// Returns how many records changed.
pub fn apply_overrides_to_store(store: &mut [CampaignRecord], overrides: &OverrideTable) -> usize {
    let mut changed = 0;
    for record in store.iter_mut() {
        if let Some(row) = overrides.get(&record.edition.to_string()) {
            let before = (record.winner.clone(), record.display_date.clone());
            apply_row(record, row);
            if (record.winner.clone(), record.display_date.clone()) != before {
                changed += 1;
            }
        }
    }
    changed
}

/// Apply one override row: present fields win, absent fields change nothing.
fn apply_row(record: &mut CampaignRecord, row: &OverrideRow) {
    if let Some(winner) = &row.winner {
        record.winner = winner.clone();
    }
    if let Some(date) = &row.date {
        record.display_date = Some(date.clone());
    }
}

/// Drop duplicate map ids within one record, first occurrence wins.
fn dedupe_maps(maps: &mut Vec<MapRecord>) {
    let mut seen = HashSet::new();
    maps.retain(|m| seen.insert(m.map_id.clone()));
}

/// Carry resolved display names over from the stored map list wherever the
/// re-fetched list still has the raw identifier.
fn keep_resolved_authors(existing: &CampaignRecord, fresh_maps: &mut [MapRecord]) {
    for map in fresh_maps.iter_mut() {
        if !map.author.is_unresolved() {
            continue;
        }
        let stored = existing.maps.iter().find(|m| m.map_id == map.map_id);
        if let Some(MapRecord {
            author: AuthorField::Resolved(name),
            ..
        }) = stored
        {
            map.author = AuthorField::Resolved(name.clone());
        }
    }
}
