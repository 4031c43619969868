//! Declarative join operations: one value per edge of a query graph,
//! interpreted by each adapter in whatever way is idiomatic for that
//! backend (aggregation stages for the document adapter, a single
//! compiled SQL statement for the relational adapter).

/// The joined side of an `Operation`: a collection (document backend) or
/// table (relational backend) plus, for the relational adapter, the
/// explicit column list needed to reassemble a joined row into a nested
/// object.
#[derive(Debug, Clone, Copy)]
pub struct JoinSource {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl JoinSource {
    #[must_use]
    pub const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, columns }
    }
}

/// One edge of a query graph.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// One-to-one left join: `as: object | null`.
    LeftJoin {
        from: JoinSource,
        local_field: &'static str,
        foreign_field: &'static str,
        r#as: &'static str,
    },
    /// Like `LeftJoin` but rows without a match are dropped.
    InnerJoin {
        from: JoinSource,
        local_field: &'static str,
        foreign_field: &'static str,
        r#as: &'static str,
    },
    /// One-to-many: `as: array`. `local_field` may reference an earlier
    /// `LeftJoinMany` alias (`alias.field`) to chain many-to-many paths.
    LeftJoinMany {
        from: JoinSource,
        local_field: &'static str,
        foreign_field: &'static str,
        r#as: &'static str,
    },
}

impl Operation {
    #[must_use]
    pub fn from(&self) -> &JoinSource {
        match self {
            Operation::LeftJoin { from, .. }
            | Operation::InnerJoin { from, .. }
            | Operation::LeftJoinMany { from, .. } => from,
        }
    }

    #[must_use]
    pub fn local_field(&self) -> &'static str {
        match self {
            Operation::LeftJoin { local_field, .. }
            | Operation::InnerJoin { local_field, .. }
            | Operation::LeftJoinMany { local_field, .. } => local_field,
        }
    }

    #[must_use]
    pub fn foreign_field(&self) -> &'static str {
        match self {
            Operation::LeftJoin { foreign_field, .. }
            | Operation::InnerJoin { foreign_field, .. }
            | Operation::LeftJoinMany { foreign_field, .. } => foreign_field,
        }
    }

    #[must_use]
    pub fn alias(&self) -> &'static str {
        match self {
            Operation::LeftJoin { r#as, .. }
            | Operation::InnerJoin { r#as, .. }
            | Operation::LeftJoinMany { r#as, .. } => r#as,
        }
    }

    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Operation::LeftJoinMany { .. })
    }

    #[must_use]
    pub fn is_inner(&self) -> bool {
        matches!(self, Operation::InnerJoin { .. })
    }
}

/// Result of a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DeleteResult {
    pub acked: bool,
    pub count: u64,
}
