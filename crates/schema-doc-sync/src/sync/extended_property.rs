//! SQL Server extended-property statements for `MS_Description`.
//!
//! Only the property name, the level type literals and the procedure name
//! are part of the statement text; schema, table, column and description
//! are always bound parameters.

use std::fmt;

/// Extended property holding human-readable descriptions.
pub const DESCRIPTION_PROPERTY: &str = "MS_Description";

/// A table-level or column-level description location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptionSlot {
    pub schema: String,
    pub table: String,
    pub column: Option<String>,
}

impl DescriptionSlot {
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: None,
        }
    }

    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: Some(column.into()),
        }
    }
}

impl fmt::Display for DescriptionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)?;
        if let Some(column) = &self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

/// Which mutation procedure to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Add,
    Update,
}

impl Mutation {
    pub fn procedure(self) -> &'static str {
        match self {
            Mutation::Add => "sp_addextendedproperty",
            Mutation::Update => "sp_updateextendedproperty",
        }
    }
}

/// Statement text with its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

impl Statement {
    pub fn params(&self) -> Vec<&str> {
        self.params.iter().map(String::as_str).collect()
    }
}

/// Query the current description at `slot` (at most one row).
pub fn lookup(slot: &DescriptionSlot) -> Statement {
    let (level2, mut params) = match &slot.column {
        Some(column) => ("N'COLUMN', @P3", vec![column.clone()]),
        None => ("NULL, NULL", Vec::new()),
    };
    params.splice(0..0, [slot.schema.clone(), slot.table.clone()]);

    Statement {
        sql: format!(
            "SELECT TOP 1 CONVERT(NVARCHAR(MAX), [value]) \
             FROM fn_listextendedproperty(N'{}', N'SCHEMA', @P1, N'TABLE', @P2, {})",
            DESCRIPTION_PROPERTY, level2
        ),
        params,
    }
}

/// Add or update the description at `slot`.
pub fn mutate(mutation: Mutation, slot: &DescriptionSlot, description: &str) -> Statement {
    let mut sql = format!(
        "EXEC {} @name = N'{}', @value = @P1, \
         @level0type = N'SCHEMA', @level0name = @P2, \
         @level1type = N'TABLE', @level1name = @P3",
        mutation.procedure(),
        DESCRIPTION_PROPERTY
    );
    let mut params = vec![
        description.to_string(),
        slot.schema.clone(),
        slot.table.clone(),
    ];

    if let Some(column) = &slot.column {
        sql.push_str(", @level2type = N'COLUMN', @level2name = @P4");
        params.push(column.clone());
    }

    Statement { sql, params }
}
