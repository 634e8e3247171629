//! CREATE TABLE statement builder.

use sqlmodel_plus_core::{Dialect, Error, FieldInfo, Model, Result, SchemaError};
use std::fmt;
use std::marker::PhantomData;

/// Backend options applied when creating tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    /// Emit `IF NOT EXISTS` (default `true`).
    pub if_not_exists: bool,
    /// Trailing table options, e.g. `STRICT` or `WITHOUT ROWID` on SQLite.
    pub table_options: Vec<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            if_not_exists: true,
            table_options: Vec::new(),
        }
    }
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_not_exists(mut self, value: bool) -> Self {
        self.if_not_exists = value;
        self
    }

    /// Append a verbatim table option.
    pub fn table_option(mut self, option: impl Into<String>) -> Self {
        self.table_options.push(option.into());
        self
    }

    /// SQLite `STRICT` typing.
    pub fn strict(self) -> Self {
        self.table_option("STRICT")
    }

    /// SQLite `WITHOUT ROWID` storage.
    pub fn without_rowid(self) -> Self {
        self.table_option("WITHOUT ROWID")
    }
}

/// Builder for CREATE TABLE statements.
pub struct CreateTable<M: Model> {
    options: CreateOptions,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> CreateTable<M> {
    /// Create a new CREATE TABLE builder.
    pub fn new() -> Self {
        Self {
            options: CreateOptions::default().if_not_exists(false),
            _marker: PhantomData,
        }
    }

    /// Create a builder from a full option set.
    pub fn with_options(options: CreateOptions) -> Self {
        Self {
            options,
            _marker: PhantomData,
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.options.if_not_exists = true;
        self
    }

    /// Append a trailing table option.
    pub fn table_option(mut self, option: impl Into<String>) -> Self {
        self.options.table_options.push(option.into());
        self
    }

    /// Build the CREATE TABLE SQL.
    pub fn build(&self, dialect: Dialect) -> Result<String> {
        let fields = M::fields();
        if fields.is_empty() {
            return Err(schema_error::<M>("model has no columns"));
        }
        for pk in M::PRIMARY_KEY {
            if M::field(pk).is_none() {
                return Err(schema_error::<M>(format!(
                    "primary key column '{}' is not a field",
                    pk
                )));
            }
        }

        let inline_pk = inline_primary_key::<M>();

        let mut sql = String::from("CREATE TABLE ");
        if self.options.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&dialect.quote_identifier(M::TABLE_NAME));
        sql.push_str(" (\n  ");

        let mut parts = Vec::with_capacity(fields.len() + 1);
        for field in fields {
            let inline = inline_pk.is_some_and(|pk| pk.column_name == field.column_name);
            parts.push(column_definition::<M>(field, dialect, inline)?);
        }

        if inline_pk.is_none() && !M::PRIMARY_KEY.is_empty() {
            let cols: Vec<_> = M::PRIMARY_KEY
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        sql.push_str(&parts.join(",\n  "));
        sql.push_str("\n)");

        if !self.options.table_options.is_empty() {
            sql.push(' ');
            sql.push_str(&self.options.table_options.join(", "));
        }

        Ok(sql)
    }

    /// `CREATE INDEX` statements for fields declaring an index.
    pub fn index_statements(&self, dialect: Dialect) -> Vec<String> {
        let exists = if self.options.if_not_exists {
            "IF NOT EXISTS "
        } else {
            ""
        };
        M::fields()
            .iter()
            .filter_map(|field| {
                field.index.map(|name| {
                    format!(
                        "CREATE INDEX {}{} ON {} ({})",
                        exists,
                        dialect.quote_identifier(name),
                        dialect.quote_identifier(M::TABLE_NAME),
                        dialect.quote_identifier(field.column_name)
                    )
                })
            })
            .collect()
    }

    /// The table statement followed by its index statements.
    pub fn statements(&self, dialect: Dialect) -> Result<Vec<String>> {
        let mut out = vec![self.build(dialect)?];
        out.extend(self.index_statements(dialect));
        Ok(out)
    }
}

impl<M: Model> Default for CreateTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> fmt::Debug for CreateTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateTable")
            .field("table", &M::TABLE_NAME)
            .field("options", &self.options)
            .finish()
    }
}

// A lone integer key is declared inline so SQLite aliases it to the rowid.
fn inline_primary_key<M: Model>() -> Option<&'static FieldInfo> {
    match M::PRIMARY_KEY {
        [only] => M::field(only).filter(|f| f.auto_increment || f.sql_type.is_integer()),
        _ => None,
    }
}

fn column_definition<M: Model>(
    field: &FieldInfo,
    dialect: Dialect,
    inline_pk: bool,
) -> Result<String> {
    let name = dialect.quote_identifier(field.column_name);

    if inline_pk {
        // aliases the rowid, so omitted values are generated
        return Ok(format!("{name} INTEGER PRIMARY KEY"));
    }

    let mut def = format!("{name} {}", field.effective_sql_type());

    if !field.nullable || field.primary_key {
        def.push_str(" NOT NULL");
    }

    if field.unique && !field.primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = field.default {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }

    if let Some(reference) = field.foreign_key {
        let Some((table, column)) = reference.split_once('.') else {
            return Err(schema_error::<M>(format!(
                "foreign key '{}' on column '{}' must be written as table.column",
                reference, field.column_name
            )));
        };
        def.push_str(&format!(
            " REFERENCES {}({})",
            dialect.quote_identifier(table),
            dialect.quote_identifier(column)
        ));
    }

    Ok(def)
}

fn schema_error<M: Model>(message: impl Into<String>) -> Error {
    Error::Schema(SchemaError {
        table: Some(M::TABLE_NAME.to_string()),
        message: message.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmodel_plus_core::{Row, SqlType, Value};

    struct TestHero;

    impl Model for TestHero {
        const TABLE_NAME: &'static str = "hero";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt)
                    .primary_key(true)
                    .auto_increment(true)
                    .nullable(true),
                FieldInfo::new("name", "name", SqlType::Text).unique(true),
                FieldInfo::new("age", "age", SqlType::Integer)
                    .nullable(true)
                    .index_opt(Some("idx_hero_age")),
                FieldInfo::new("team_id", "team_id", SqlType::BigInt)
                    .nullable(true)
                    .foreign_key_opt(Some("team.id")),
                FieldInfo::new("rank", "rank", SqlType::Integer).default_opt(Some("0")),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(TestHero)
        }

        fn primary_key_value(&self) -> Vec<Value> {
            Vec::new()
        }

        fn is_new(&self) -> bool {
            true
        }
    }

    struct Membership;

    impl Model for Membership {
        const TABLE_NAME: &'static str = "membership";
        const PRIMARY_KEY: &'static [&'static str] = &["team", "member"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("team", "team", SqlType::Text).primary_key(true),
                FieldInfo::new("member", "member", SqlType::Text).primary_key(true),
                FieldInfo::new("role", "role", SqlType::Text)
                    .sql_type_override_opt(Some("VARCHAR(16)")),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Membership)
        }

        fn primary_key_value(&self) -> Vec<Value> {
            Vec::new()
        }

        fn is_new(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_create_table_sqlite() {
        let sql = CreateTable::<TestHero>::new().build(Dialect::Sqlite).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"hero\" (\n  \
             \"id\" INTEGER PRIMARY KEY,\n  \
             \"name\" TEXT NOT NULL UNIQUE,\n  \
             \"age\" INTEGER,\n  \
             \"team_id\" BIGINT REFERENCES \"team\"(\"id\"),\n  \
             \"rank\" INTEGER NOT NULL DEFAULT 0\n)"
        );
    }

    #[test]
    fn test_create_table_if_not_exists_and_options() {
        let sql = CreateTable::<Membership>::with_options(CreateOptions::new().without_rowid())
            .build(Dialect::Sqlite)
            .unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"membership\""));
        assert!(sql.contains("PRIMARY KEY (\"team\", \"member\")"));
        assert!(sql.contains("\"role\" VARCHAR(16) NOT NULL"));
        assert!(sql.ends_with(") WITHOUT ROWID"));
    }

    #[test]
    fn test_index_statements() {
        let stmts = CreateTable::<TestHero>::new()
            .if_not_exists()
            .statements(Dialect::Sqlite)
            .unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[1],
            "CREATE INDEX IF NOT EXISTS \"idx_hero_age\" ON \"hero\" (\"age\")"
        );
    }

    #[test]
    fn test_malformed_foreign_key() {
        struct Broken;
        impl Model for Broken {
            const TABLE_NAME: &'static str = "broken";
            const PRIMARY_KEY: &'static [&'static str] = &["id"];
            fn fields() -> &'static [FieldInfo] {
                static FIELDS: &[FieldInfo] = &[
                    FieldInfo::new("id", "id", SqlType::Integer).primary_key(true),
                    FieldInfo::new("parent", "parent", SqlType::Integer)
                        .foreign_key_opt(Some("parent")),
                ];
                FIELDS
            }
            fn to_row(&self) -> Vec<(&'static str, Value)> {
                Vec::new()
            }
            fn from_row(_row: &Row) -> Result<Self> {
                Ok(Broken)
            }
            fn primary_key_value(&self) -> Vec<Value> {
                Vec::new()
            }
            fn is_new(&self) -> bool {
                true
            }
        }

        let err = CreateTable::<Broken>::new().build(Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, Error::Schema(ref e) if e.table.as_deref() == Some("broken")));
    }
}
