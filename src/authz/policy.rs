use crate::authz::errors::AuthzError;
use crate::authz::types::*;
use kdl::KdlDocument;

/// Parse a KDL document string into typed policy structs.
///
/// ```kdl
/// grant "foo" action="Query" to="alice"
/// member "alice" of="public"
/// ```
pub fn parse_kdl_document(source: &str) -> Result<ParsedPolicy, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut policy = ParsedPolicy::default();

    for node in doc.nodes() {
        match node.name().value() {
            "grant" => {
                let resource = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidGrant(
                        "grant node requires a field argument (e.g. grant \"foo\" action=\"Query\" to=\"alice\")"
                            .into(),
                    )
                })?;

                let action = node
                    .get("action")
                    .and_then(|v| v.as_string())
                    .ok_or_else(|| {
                        AuthzError::InvalidGrant(format!(
                            "grant `{resource}` missing `action` property (e.g. action=\"Query\")"
                        ))
                    })?;
                let action: Action = action.parse().map_err(AuthzError::UnknownAction)?;

                let subject = node
                    .get("to")
                    .and_then(|v| v.as_string())
                    .ok_or_else(|| {
                        AuthzError::InvalidGrant(format!(
                            "grant `{resource}` missing `to` property (e.g. to=\"alice\")"
                        ))
                    })?;

                policy
                    .permissions
                    .push(Permission::new(subject, resource, action));
            }
            "member" => {
                let member = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidMembership(
                        "member node requires an identity argument (e.g. member \"alice\" of=\"public\")"
                            .into(),
                    )
                })?;

                let group = node
                    .get("of")
                    .and_then(|v| v.as_string())
                    .ok_or_else(|| {
                        AuthzError::InvalidMembership(format!(
                            "member `{member}` missing `of` property (e.g. of=\"public\")"
                        ))
                    })?;

                policy.memberships.push(Membership {
                    member,
                    group: group.to_string(),
                });
            }
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(policy)
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}
