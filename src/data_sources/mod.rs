//! Read-only lookups of Coralogix entities.
//!
//! Every data source reuses its resource's model and flatten function, with
//! the resource schema turned into a lookup schema by
//! [`Schema::into_lookup`](crate::schema::Schema::into_lookup). Unlike
//! resources, a lookup that finds nothing fails.

pub mod alert;
pub mod archive_retentions;
pub mod custom_role;
pub mod view;
pub mod webhook;

pub use alert::AlertDataSource;
pub use archive_retentions::ArchiveRetentionsDataSource;
pub use custom_role::CustomRoleDataSource;
pub use view::ViewDataSource;
pub use webhook::WebhookDataSource;

use crate::error::ProviderError;
use crate::transcode::Result;
use crate::types::TfValue;

/// How a lookup data source finds its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Decide whether a configuration looks an object up by ID or by name.
pub(crate) fn lookup<'a>(id: &'a TfValue<String>, name: &'a TfValue<String>) -> Result<Lookup<'a>> {
    match (id.as_known(), name.as_known()) {
        (Some(id), None) => Ok(Lookup::Id(id)),
        (None, Some(name)) => Ok(Lookup::Name(name)),
        (Some(_), Some(_)) => Err(ProviderError::Validation(
            "only one of id or name may be set".to_string(),
        )),
        (None, None) => Err(ProviderError::Validation("one of id or name must be set".to_string())),
    }
}

/// The one object among `candidates` carrying `name`.
pub(crate) fn by_name<T>(kind: &str, name: &str, candidates: impl IntoIterator<Item = (String, T)>) -> Result<T> {
    let mut matches: Vec<T> = candidates
        .into_iter()
        .filter(|(candidate, _)| candidate == name)
        .map(|(_, item)| item)
        .collect();
    match matches.len() {
        0 => Err(ProviderError::NotFound(format!("no {} named \"{}\"", kind, name))),
        1 => Ok(matches.remove(0)),
        n => Err(ProviderError::Validation(format!(
            "{} {} share the name \"{}\"; look it up by id instead",
            n, kind, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let id = TfValue::known("7");
        let name = TfValue::known("viewer");
        assert_eq!(lookup(&id, &TfValue::Null).unwrap(), Lookup::Id("7"));
        assert_eq!(lookup(&TfValue::Null, &name).unwrap(), Lookup::Name("viewer"));
        assert!(lookup(&id, &name).is_err());
        assert!(lookup(&TfValue::Null, &TfValue::Null).is_err());
    }

    #[test]
    fn test_by_name() {
        let candidates = || vec![("a".to_string(), 1), ("b".to_string(), 2), ("b".to_string(), 3)];
        assert_eq!(by_name("roles", "a", candidates()).unwrap(), 1);
        assert!(by_name("roles", "c", candidates()).unwrap_err().is_not_found());
        let err = by_name("roles", "b", candidates()).unwrap_err();
        assert!(err.to_string().contains("2 roles"));
    }
}
