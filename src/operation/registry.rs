//! Operation registry
//!
//! Maps configuration names onto operation kinds. Resolution runs once at
//! startup and produces the kind set every batch samples from.

use super::OperationKind;
use crate::error::Error;

/// Name that expands to every registered kind
pub const WILDCARD: &str = "all";

/// Find the kind registered under `name`
pub fn lookup(name: &str) -> Result<OperationKind, Error> {
    OperationKind::ALL
        .iter()
        .copied()
        .find(|kind| kind.name() == name)
        .ok_or_else(|| Error::UnknownOperation(name.to_string()))
}

/// Resolve requested operation names into the kind set
///
/// Duplicates are kept, so repeating a name weights that kind more heavily
/// when batches are sampled. The wildcard expands in place to every kind in
/// registration order.
pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Vec<OperationKind>, Error> {
    if names.is_empty() {
        return Err(Error::config("no operations specified"));
    }

    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref().trim();
        if name == WILDCARD {
            kinds.extend_from_slice(&OperationKind::ALL);
        } else {
            kinds.push(lookup(name)?);
        }
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_resolves_all_in_order() {
        let kinds = resolve(&["all"]).unwrap();
        assert_eq!(kinds, OperationKind::ALL.to_vec());

        let names: Vec<_> = kinds.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "write",
                "plain_write",
                "read",
                "remove",
                "set_backend_readonly",
                "set_backend_writable",
                "start_defrag",
                "stat_monitor",
                "write_cache",
            ]
        );
    }

    #[test]
    fn test_wildcard_has_no_duplicates() {
        let kinds = resolve(&[WILDCARD]).unwrap();
        for (i, kind) in kinds.iter().enumerate() {
            assert!(!kinds[i + 1..].contains(kind), "{} listed twice", kind);
        }
    }

    #[test]
    fn test_explicit_names() {
        let kinds = resolve(&["write", "read"]).unwrap();
        assert_eq!(kinds, vec![OperationKind::Write, OperationKind::Read]);
    }

    #[test]
    fn test_duplicates_preserved() {
        let kinds = resolve(&["write", "write", "remove"]).unwrap();
        assert_eq!(
            kinds,
            vec![OperationKind::Write, OperationKind::Write, OperationKind::Remove]
        );
    }

    #[test]
    fn test_empty_request_rejected() {
        let names: [&str; 0] = [];
        let err = resolve(&names).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no operations specified"));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = resolve(&["write", "bogus_name"]).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, Error::UnknownOperation(ref name) if name == "bogus_name"));
    }

    #[test]
    fn test_names_are_trimmed() {
        assert_eq!(resolve(&[" stat_monitor "]).unwrap(), vec![OperationKind::StatMonitor]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(lookup("Write").is_err());
        assert_eq!(lookup("write").unwrap(), OperationKind::Write);
    }
}
