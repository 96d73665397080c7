//! Structural view of a GraphQL request document.
//!
//! The gate does not validate or execute queries. It only needs, for every
//! operation in document order, the operation kind and the names of the fields
//! selected at the operation's top level. Fragment spreads and inline
//! fragments at that level are flattened into the operation's field list so a
//! field cannot dodge authorization by being wrapped in a fragment. Nested
//! selections below a field are never inspected.

use std::collections::{HashMap, HashSet};

use async_graphql::parser::types::{
    DocumentOperations, FragmentDefinition, OperationDefinition, OperationType, Selection,
    SelectionSet,
};
use async_graphql::parser::{parse_query, Positioned};
use async_graphql::Name;
use miette::Diagnostic;
use thiserror::Error;

use crate::authz::Action;

#[derive(Debug, Error, Diagnostic)]
pub enum InspectError {
    #[error("{0}")]
    #[diagnostic(code(fieldgate::inspect::syntax))]
    Syntax(String),

    #[error("unknown fragment `{0}`")]
    #[diagnostic(
        code(fieldgate::inspect::unknown_fragment),
        help("Every `...name` spread must refer to a fragment defined in the same document")
    )]
    UnknownFragment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// The policy action guarding fields of this kind, if any.
    pub fn action(self) -> Option<Action> {
        match self {
            OperationKind::Query => Some(Action::Query),
            OperationKind::Mutation => Some(Action::Mutation),
            OperationKind::Subscription => None,
        }
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: Option<String>,
    pub kind: OperationKind,
    /// Top-level field names in selection order, without duplicates. Always
    /// empty for kinds that carry no action.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub operations: Vec<Operation>,
}

impl ParsedQuery {
    /// Every `(field, action)` pair that must be authorized, in document order
    /// then selection order.
    pub fn checks(&self) -> impl Iterator<Item = (&str, Action)> + '_ {
        self.operations.iter().flat_map(|op| {
            let action = op.kind.action();
            op.fields
                .iter()
                .filter_map(move |field| action.map(|a| (field.as_str(), a)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

type Fragments = HashMap<Name, Positioned<FragmentDefinition>>;

/// Parse `source` into a [`ParsedQuery`]. Blank input yields no operations.
pub fn inspect(source: &str) -> Result<ParsedQuery, InspectError> {
    if source.trim().is_empty() {
        return Ok(ParsedQuery::default());
    }

    let document = parse_query(source).map_err(|e| InspectError::Syntax(e.to_string()))?;

    let mut definitions: Vec<(Option<&Name>, &Positioned<OperationDefinition>)> =
        match &document.operations {
            DocumentOperations::Single(op) => vec![(None, op)],
            DocumentOperations::Multiple(ops) => {
                ops.iter().map(|(name, op)| (Some(name), op)).collect()
            }
        };
    // Named operations come back from the parser in a hash map.
    definitions.sort_by_key(|(_, op)| (op.pos.line, op.pos.column));

    let mut operations = Vec::with_capacity(definitions.len());
    for (name, op) in definitions {
        let kind = OperationKind::from(op.node.ty);
        let fields = if kind.action().is_some() {
            let mut walk = FieldWalk::default();
            walk.collect(&op.node.selection_set.node, &document.fragments)?;
            walk.fields
        } else {
            Vec::new()
        };
        operations.push(Operation {
            name: name.map(|n| n.to_string()),
            kind,
            fields,
        });
    }

    Ok(ParsedQuery { operations })
}

/// Top-level fields of one operation, in selection order.
#[derive(Default)]
struct FieldWalk<'a> {
    visited: HashSet<&'a Name>,
    seen: HashSet<&'a str>,
    fields: Vec<String>,
}

impl<'a> FieldWalk<'a> {
    fn collect(
        &mut self,
        selection_set: &'a SelectionSet,
        fragments: &'a Fragments,
    ) -> Result<(), InspectError> {
        for item in &selection_set.items {
            match &item.node {
                Selection::Field(field) => {
                    let name = field.node.name.node.as_str();
                    if self.seen.insert(name) {
                        self.fields.push(name.to_string());
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let fragment_name = &spread.node.fragment_name.node;
                    let (key, fragment) = fragments
                        .get_key_value(fragment_name)
                        .ok_or_else(|| InspectError::UnknownFragment(fragment_name.to_string()))?;
                    if self.visited.insert(key) {
                        self.collect(&fragment.node.selection_set.node, fragments)?;
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.collect(&inline.node.selection_set.node, fragments)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(parsed: &ParsedQuery) -> Vec<(&str, Action)> {
        parsed.checks().collect()
    }

    #[test]
    fn test_anonymous_query() {
        let parsed = inspect("{ foo bar }").unwrap();
        assert_eq!(parsed.operations.len(), 1);
        assert_eq!(parsed.operations[0].kind, OperationKind::Query);
        assert_eq!(parsed.operations[0].name, None);
        assert_eq!(
            fields(&parsed),
            vec![("foo", Action::Query), ("bar", Action::Query)]
        );
    }

    #[test]
    fn test_mutation_maps_to_mutation_action() {
        let parsed = inspect("mutation { fee }").unwrap();
        assert_eq!(fields(&parsed), vec![("fee", Action::Mutation)]);
    }

    #[test]
    fn test_only_top_level_fields_are_collected() {
        let parsed = inspect("query { user { secret posts { title } } }").unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["user"]);
    }

    #[test]
    fn test_alias_uses_field_name() {
        let parsed = inspect("{ renamed: foo }").unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["foo"]);
    }

    #[test]
    fn test_duplicate_fields_collapse() {
        let parsed = inspect("{ a: foo b: foo bar }").unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["foo", "bar"]);
    }

    #[test]
    fn test_wide_selection_keeps_order() {
        let names: Vec<String> = (0..50_000).map(|i| format!("f{i}")).collect();
        let source = format!("{{ {} f0 f1 }}", names.join(" "));

        let started = std::time::Instant::now();
        let parsed = inspect(&source).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        assert_eq!(parsed.operations[0].fields, names);
    }

    #[test]
    fn test_named_operations_keep_document_order() {
        let source = r#"
            mutation Second { fee }
            query First { foo }
            query Third { baz }
        "#;
        let parsed = inspect(source).unwrap();
        let names: Vec<_> = parsed
            .operations
            .iter()
            .map(|op| op.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Second", "First", "Third"]);
        assert_eq!(
            fields(&parsed),
            vec![
                ("fee", Action::Mutation),
                ("foo", Action::Query),
                ("baz", Action::Query)
            ]
        );
    }

    #[test]
    fn test_subscription_fields_are_not_checked() {
        let parsed = inspect("subscription { ticks }").unwrap();
        assert_eq!(parsed.operations.len(), 1);
        assert_eq!(parsed.operations[0].kind, OperationKind::Subscription);
        assert!(parsed.operations[0].fields.is_empty());
        assert_eq!(parsed.checks().count(), 0);
    }

    #[test]
    fn test_fragment_spread_is_expanded() {
        let source = r#"
            query { foo ...Secrets }
            fragment Secrets on RootQuery { hidden }
        "#;
        let parsed = inspect(source).unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["foo", "hidden"]);
    }

    #[test]
    fn test_inline_fragment_is_expanded() {
        let parsed = inspect("{ ... on RootQuery { hidden } foo }").unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["hidden", "foo"]);
    }

    #[test]
    fn test_nested_fragment_spreads() {
        let source = r#"
            { ...Outer }
            fragment Outer on RootQuery { foo ...Inner }
            fragment Inner on RootQuery { bar }
        "#;
        let parsed = inspect(source).unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["foo", "bar"]);
    }

    #[test]
    fn test_cyclic_fragments_terminate() {
        let source = r#"
            { ...A }
            fragment A on RootQuery { foo ...B }
            fragment B on RootQuery { bar ...A }
        "#;
        let parsed = inspect(source).unwrap();
        assert_eq!(parsed.operations[0].fields, vec!["foo", "bar"]);
    }

    #[test]
    fn test_unknown_fragment_is_an_error() {
        let err = inspect("{ ...Missing }").unwrap_err();
        assert!(matches!(err, InspectError::UnknownFragment(name) if name == "Missing"));
    }

    #[test]
    fn test_syntax_error() {
        let err = inspect("query { foo").unwrap_err();
        assert!(matches!(err, InspectError::Syntax(_)));
    }

    #[test]
    fn test_blank_source_is_empty() {
        assert!(inspect("").unwrap().is_empty());
        assert!(inspect("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_introspection_field() {
        let parsed = inspect("{ __schema { types { name } } }").unwrap();
        assert_eq!(fields(&parsed), vec![("__schema", Action::Query)]);
    }
}
