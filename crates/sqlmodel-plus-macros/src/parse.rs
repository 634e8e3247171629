//! Attribute parsing for `#[derive(Model)]` and `#[derive(Record)]`.

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name (e.g., `Hero`).
    pub name: Ident,
    /// The SQL table name (e.g., `"hero"`).
    pub table_name: String,
    /// Parsed field definitions.
    pub fields: Vec<FieldDef>,
    /// Generic parameters from the struct.
    pub generics: Generics,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name (e.g., `secret_name`).
    pub name: Ident,
    /// The SQL column name (e.g., `"secret_name"` or custom override).
    pub column_name: String,
    /// The Rust type of the field.
    pub ty: Type,
    /// Optional SQL type override (e.g., `"VARCHAR(100)"`).
    pub sql_type: Option<String>,
    /// Whether the field allows NULL values.
    pub nullable: bool,
    /// Whether this field is (part of) the primary key.
    pub primary_key: bool,
    /// Whether the field auto-increments.
    pub auto_increment: bool,
    /// Whether the field has a UNIQUE constraint.
    pub unique: bool,
    /// Foreign key reference (e.g., `"team.id"`).
    pub foreign_key: Option<String>,
    /// SQL DEFAULT expression.
    pub default: Option<String>,
    /// Index name if this field is indexed.
    pub index: Option<String>,
    /// Skip this field entirely in database operations.
    pub skip: bool,
}

/// Struct-level `#[sqlmodel(...)]` attributes, shared by both derives.
#[derive(Debug, Default)]
pub struct StructAttrs {
    pub table_name: Option<String>,
    pub scope: Option<String>,
}

impl ModelDef {
    /// Fields that are part of the primary key, in declaration order.
    ///
    /// Without an explicit `primary_key`, a field named `id` is the key.
    pub fn primary_key_fields(&self) -> Vec<&FieldDef> {
        let explicit: Vec<_> = self.fields.iter().filter(|f| f.primary_key).collect();
        if !explicit.is_empty() {
            return explicit;
        }
        self.fields
            .iter()
            .filter(|f| f.name == "id" && !f.skip)
            .collect()
    }

    /// Fields stored in the database.
    pub fn column_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| !f.skip).collect()
    }
}

/// Parse a `#[derive(Model)]` input into a [`ModelDef`].
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();
    let attrs = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let table_name = attrs
        .table_name
        .unwrap_or_else(|| derive_table_name(&name.to_string()));

    let mut model = ModelDef {
        name,
        table_name,
        fields,
        generics: input.generics.clone(),
    };
    infer_auto_increment(&mut model);
    Ok(model)
}

/// Parse struct-level `#[sqlmodel(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"` (overrides derived table name)
/// - `scope = "name"` (engine scope for `Record` verbs)
pub fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut out = StructAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("sqlmodel") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if out.table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate sqlmodel attribute: table",
                    ));
                }
                out.table_name = Some(string_value(&meta, "table name")?);
                Ok(())
            } else if meta.path.is_ident("scope") {
                if out.scope.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate sqlmodel attribute: scope",
                    ));
                }
                let scope = string_value(&meta, "scope")?;
                if scope.trim().is_empty() {
                    return Err(Error::new_spanned(meta.path, "scope must not be empty"));
                }
                out.scope = Some(scope);
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown sqlmodel struct attribute (supported: table, scope)",
                ))
            }
        })?;
    }

    Ok(out)
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {what}"),
        ))
    }
}

/// Derive table name from struct name: `TeamMember` -> `team_member`.
fn derive_table_name(struct_name: &str) -> String {
    to_snake_case(struct_name)
}

/// Convert PascalCase to snake_case.
///
/// Examples:
/// - `Hero` -> `hero`
/// - `TeamMember` -> `team_member`
/// - `HTTPServer` -> `http_server`
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();

                // word boundary, or the last capital of an acronym
                let should_underscore = prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase()));

                if should_underscore {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Parse all fields from a struct.
fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

/// Parse a single field and its attributes.
fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let ty = field.ty.clone();
    let attrs = parse_field_attrs(&field.attrs, &name)?;
    let column_name = attrs.column.unwrap_or_else(|| name.unraw().to_string());

    Ok(FieldDef {
        name,
        column_name,
        sql_type: attrs.sql_type,
        nullable: attrs.nullable.unwrap_or_else(|| is_option_type(&ty)),
        ty,
        primary_key: attrs.primary_key,
        auto_increment: attrs.auto_increment,
        unique: attrs.unique,
        foreign_key: attrs.foreign_key,
        default: attrs.default,
        index: attrs.index,
        skip: attrs.skip,
    })
}

/// Intermediate struct for collecting field attributes.
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    sql_type: Option<String>,
    nullable: Option<bool>,
    primary_key: bool,
    auto_increment: bool,
    unique: bool,
    foreign_key: Option<String>,
    default: Option<String>,
    index: Option<String>,
    skip: bool,
}

/// Parse all `#[sqlmodel(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute], field_name: &Ident) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("sqlmodel") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("auto_increment") {
                result.auto_increment = true;
            } else if path.is_ident("nullable") {
                result.nullable = Some(true);
            } else if path.is_ident("unique") {
                result.unique = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("column") {
                result.column = Some(string_value(&meta, "column name")?);
            } else if path.is_ident("sql_type") {
                result.sql_type = Some(string_value(&meta, "sql_type")?);
            } else if path.is_ident("default") {
                result.default = Some(string_value(&meta, "default")?);
            } else if path.is_ident("index") {
                result.index = Some(string_value(&meta, "index")?);
            } else if path.is_ident("foreign_key") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for foreign_key",
                    ));
                };
                let fk = lit_str.value();
                if !fk.contains('.') {
                    return Err(Error::new_spanned(
                        lit_str,
                        "foreign_key must be in format 'table.column'",
                    ));
                }
                result.foreign_key = Some(fk);
            } else {
                return Err(Error::new_spanned(
                    path,
                    "unknown sqlmodel field attribute (supported: primary_key, auto_increment, \
                     nullable, unique, skip, column, sql_type, default, index, foreign_key)",
                ));
            }
            Ok(())
        })?;
    }

    if result.skip && result.primary_key {
        return Err(Error::new_spanned(
            field_name,
            "cannot use both `skip` and `primary_key` on the same field",
        ));
    }

    Ok(result)
}

// A lone `Option<integer>` key is filled in by the database on insert.
fn infer_auto_increment(model: &mut ModelDef) {
    let pk_names: Vec<Ident> = model
        .primary_key_fields()
        .iter()
        .map(|f| f.name.clone())
        .collect();
    if let [pk] = pk_names.as_slice() {
        if let Some(field) = model.fields.iter_mut().find(|f| &f.name == pk) {
            if is_option_type(&field.ty) && crate::infer::is_integer_type(&field.ty) {
                field.auto_increment = true;
            }
        }
    }
}

/// Check if a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("Hero"), "hero");
        assert_eq!(to_snake_case("TeamMember"), "team_member");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
    }

    #[test]
    fn test_parse_model_defaults() {
        let input: DeriveInput = parse_quote! {
            struct TeamMember {
                id: Option<i64>,
                name: String,
                nickname: Option<String>,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.table_name, "team_member");
        let pk = def.primary_key_fields();
        assert_eq!(pk.len(), 1);
        assert_eq!(pk[0].name, "id");
        assert!(pk[0].auto_increment);
        assert!(pk[0].nullable);
        assert!(!def.fields[1].nullable);
        assert!(def.fields[2].nullable);
    }

    #[test]
    fn test_parse_model_table_and_scope() {
        let input: DeriveInput = parse_quote! {
            #[sqlmodel(table = "events", scope = "analytics")]
            struct Event {
                #[sqlmodel(primary_key)]
                code: String,
                #[sqlmodel(column = "event_name", unique, index = "idx_event_name")]
                name: String,
                #[sqlmodel(skip)]
                cache: Vec<u8>,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.table_name, "events");
        assert!(!def.fields[0].auto_increment);
        assert_eq!(def.fields[1].column_name, "event_name");
        assert!(def.fields[1].unique);
        assert_eq!(def.fields[1].index.as_deref(), Some("idx_event_name"));
        assert_eq!(def.column_fields().len(), 2);

        let attrs = parse_struct_attrs(&input.attrs).unwrap();
        assert_eq!(attrs.scope.as_deref(), Some("analytics"));
    }

    #[test]
    fn test_composite_key_is_not_auto_increment() {
        let input: DeriveInput = parse_quote! {
            struct Link {
                #[sqlmodel(primary_key)]
                a: Option<i64>,
                #[sqlmodel(primary_key)]
                b: Option<i64>,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.primary_key_fields().len(), 2);
        assert!(def.fields.iter().all(|f| !f.auto_increment));
    }

    #[test]
    fn test_parse_errors() {
        let input: DeriveInput = parse_quote! {
            #[sqlmodel(not_a_real_key = "x")]
            struct Event { id: i64 }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("unknown sqlmodel struct attribute"));

        let input: DeriveInput = parse_quote! {
            struct Event {
                #[sqlmodel(foreign_key = "team")]
                team_id: i64,
            }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("table.column"));

        let input: DeriveInput = parse_quote! {
            struct Event {
                #[sqlmodel(skip, primary_key)]
                id: i64,
            }
        };
        assert!(parse_model(&input).is_err());

        let input: DeriveInput = parse_quote! {
            #[sqlmodel(scope = "")]
            struct Event { id: i64 }
        };
        assert!(parse_struct_attrs(&input.attrs).is_err());
    }
}
