use std::fmt::Display;

/// The named slot an AST element occupies under its parent, or a key into
/// the `RoledValues` extracted from an element by the content resolver.
///
/// Roles serve two purposes: they group heterogeneous children of a single
/// element into role-groups (see [`crate::node`]) for PCS purposes, and they
/// key the `(role, value)` pairs produced by the content resolver (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    // structural / role-group roles
    TypeParameter,
    Parameter,
    TypeMember,
    Then,
    Else,

    // content-resolver roles
    IsImplicit,
    Value,
    Name,
    OperatorKind,
    IsVarargs,
    IsInferred,
    Modifier,
    IsUpper,
    CommentContent,
    CommentType,
    IsDefault,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::TypeParameter => "TYPE_PARAMETER",
            Role::Parameter => "PARAMETER",
            Role::TypeMember => "TYPE_MEMBER",
            Role::Then => "THEN",
            Role::Else => "ELSE",
            Role::IsImplicit => "IS_IMPLICIT",
            Role::Value => "VALUE",
            Role::Name => "NAME",
            Role::OperatorKind => "OPERATOR_KIND",
            Role::IsVarargs => "IS_VARARGS",
            Role::IsInferred => "IS_INFERRED",
            Role::Modifier => "MODIFIER",
            Role::IsUpper => "IS_UPPER",
            Role::CommentContent => "COMMENT_CONTENT",
            Role::CommentType => "COMMENT_TYPE",
            Role::IsDefault => "IS_DEFAULT",
        };
        write!(f, "{name}")
    }
}

/// A single `(role, value)` pair as extracted from an AST element by the
/// content resolver (§3.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoledValue {
    pub role: Role,
    pub value: String,
}

impl RoledValue {
    pub fn new(role: Role, value: impl Into<String>) -> Self {
        Self {
            role,
            value: value.into(),
        }
    }
}

/// An ordered collection of `(role, value)` pairs capturing the "content" of
/// a node (§3.3). Equality is pairwise equal on `(role, value)`, which is the
/// derived `PartialEq` on the `Vec`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoledValues(pub Vec<RoledValue>);

impl RoledValues {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, role: Role, value: impl Into<String>) {
        self.0.push(RoledValue::new(role, value));
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.0
            .iter()
            .find(|rv| rv.role == role)
            .map(|rv| rv.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoledValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
