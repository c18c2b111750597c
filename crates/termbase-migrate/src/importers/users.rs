//! User account importers: accounts with memberships, web credentials and
//! API tokens.

use std::collections::BTreeSet;

use termbase_core::{uri, EntityId, Lookup, Record, User};
use tracing::debug;

use super::upsert::{upsert, Draft, Upserted};
use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::legacy::LegacyRecord;
use crate::report::Bucket;

/// Splits a full name into first name (every part but the last) and last
/// name (the last part).
#[must_use]
pub fn split_full_name(full_name: &str) -> (String, String) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.split_last() {
        Some((last, rest)) => (rest.join(" "), (*last).to_string()),
        None => (String::new(), String::new()),
    }
}

fn organization_ids(ctx: &mut ImportContext, legacy_ids: &[String]) -> BTreeSet<EntityId> {
    legacy_ids
        .iter()
        .filter_map(|id| ctx.organization(Lookup::InternalReferenceId(id)))
        .map(|org| org.id)
        .collect()
}

/// Imports user accounts, keyed by username.
///
/// An account that already exists gains the memberships listed in the
/// record and is reported as updated.
#[derive(Debug, Default)]
pub struct UserImporter;

impl LineImporter for UserImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::User
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let username = record.require_str("username")?;
        let legacy_orgs = record.take_string_list("organizations");
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.users(),
            Lookup::NaturalKey(&username),
            |ctx| {
                record.discard(&["_id"]);
                let (derived_first, derived_last) =
                    split_full_name(&record.take_str("full_name").unwrap_or_default());
                let password = record.take_str("password");
                let hashed_password = record.take_str("hashed_password");
                let audit = ctx.audit(record);
                Ok(Draft::new(User {
                    uri: uri::user_uri(&username),
                    internal_reference_id: record.take_oid("user_id"),
                    first_name: record.take_str("first_name").unwrap_or(derived_first),
                    last_name: record.take_str("last_name").unwrap_or(derived_last),
                    email: record.take_str("email"),
                    company: record.take_str("company"),
                    location: record.take_str("location"),
                    preferred_locale: record.take_str("preferred_locale"),
                    website: record.take_str("website"),
                    verified: record.take_bool("verified_email").unwrap_or(true),
                    password: password.or(hashed_password),
                    date_joined: record.take_date("date_joined"),
                    last_login: record.take_date("last_login"),
                    organizations: organization_ids(ctx, &legacy_orgs),
                    extras: record.take_object("extras"),
                    audit,
                    ..User::new(username.as_str())
                }))
            },
            |ctx, user| {
                ctx.caches.users.remember(user);
                Ok(())
            },
        )?;

        match outcome {
            Upserted::Created(_) => Ok(Bucket::Created),
            Upserted::Existed(mut user) => {
                let memberships = organization_ids(ctx, &legacy_orgs);
                let added = memberships.difference(&user.organizations).count();
                user.organizations.extend(memberships);
                ctx.store.users().update(&user)?;
                ctx.caches.users.remember(&user);
                debug!(username = %user.username, added, "Added memberships to existing user");
                Ok(Bucket::Updated)
            }
        }
    }
}

/// Sets password and last login of existing users.
#[derive(Debug, Default)]
pub struct WebUserCredentialImporter;

impl LineImporter for WebUserCredentialImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::WebUserCredential
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let username = record.require_str("username")?;
        let Some(mut user) = ctx.store.users().find(&Lookup::NaturalKey(&username)) else {
            return Ok(Bucket::NotFound);
        };
        user.password = record.take_str("password");
        if let Some(last_login) = record.take_date("last_login") {
            user.last_login = Some(last_login);
        }
        ctx.store.users().update(&user)?;
        Ok(Bucket::Updated)
    }
}

/// Sets API tokens of users who logged in recently enough.
#[derive(Debug, Default)]
pub struct TokenImporter;

impl LineImporter for TokenImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::Token
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let username = record.require_str("username")?;
        let Some(mut user) = ctx.store.users().find(&Lookup::NaturalKey(&username)) else {
            return Ok(Bucket::NotFound);
        };
        if user
            .last_login
            .is_some_and(|last_login| last_login < ctx.options.token_cutoff)
        {
            return Ok(Bucket::OldUsers);
        }
        user.token = record.take_str("token");
        ctx.store.users().update(&user)?;
        debug!(user_id = user.id(), "Token set");
        Ok(Bucket::Updated)
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod tests;
