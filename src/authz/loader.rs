use std::path::Path;

use crate::authz::errors::AuthzError;
use crate::authz::policy::parse_kdl_document;
use crate::authz::store::PolicyStore;

/// Load all `.kdl` policy files from the given directory, in path order, and
/// merge them into a single `PolicyStore`.
pub fn load_policies(dir: &Path) -> Result<PolicyStore, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidPolicy(format!(
            "policies directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut all_parsed = Vec::new();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::PolicyLoadError {
                path: path.display().to_string(),
                source,
            })?;
        all_parsed.push(parse_kdl_document(&contents)?);
    }

    let file_count = all_parsed.len();
    let store = PolicyStore::from_policies(all_parsed);

    tracing::info!(
        files = file_count,
        grants = store.permission_count(),
        memberships = store.membership_count(),
        "Loaded authorization policies"
    );

    Ok(store)
}
