//! Organization importer.

use termbase_core::{uri, Lookup, Organization};

use super::upsert::{upsert, Draft};
use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::legacy::LegacyRecord;

/// Imports organizations, keyed by mnemonic.
#[derive(Debug, Default)]
pub struct OrganizationImporter;

impl LineImporter for OrganizationImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::Organization
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let mnemonic = record.require_str("mnemonic")?;
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.organizations(),
            Lookup::NaturalKey(&mnemonic),
            |ctx| {
                let audit = ctx.audit(record);
                Ok(Draft::new(Organization {
                    uri: record
                        .take_str("uri")
                        .unwrap_or_else(|| uri::org_uri(&mnemonic)),
                    name: record.take_str("name"),
                    company: record.take_str("company"),
                    website: record.take_str("website"),
                    location: record.take_str("location"),
                    public_access: record.take_str("public_access"),
                    internal_reference_id: record.take_oid("_id"),
                    extras: record.take_object("extras"),
                    audit,
                    ..Organization::new(mnemonic.as_str())
                }))
            },
            |ctx, org| {
                ctx.caches.organizations.remember(org);
                Ok(())
            },
        )?;
        Ok(outcome.bucket())
    }
}

#[cfg(test)]
#[path = "organizations_tests.rs"]
mod tests;
