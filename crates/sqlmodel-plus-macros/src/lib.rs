//! Procedural macros for SQLModel Plus.
//!
//! - `#[derive(Model)]` produces a `Model` implementation with table and
//!   column metadata consumed by the query, schema and session layers.
//! - `#[derive(Record)]` attaches the ActiveRecord verbs of the
//!   `sqlmodel-plus` facade, optionally bound to a named engine scope.
//!
//! Generated code refers to `sqlmodel_plus_core` and `sqlmodel_plus` by
//! name, so crates deriving these traits depend on both.

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod infer;
mod parse;

use parse::{ModelDef, parse_model, parse_struct_attrs};

/// Derive macro for the `Model` trait.
///
/// # Attributes
///
/// - `#[sqlmodel(table = "name")]` - Override table name (defaults to the snake_case struct name)
/// - `#[sqlmodel(primary_key)]` - Mark field as primary key (defaults to a field named `id`)
/// - `#[sqlmodel(auto_increment)]` - Mark field as auto-incrementing
/// - `#[sqlmodel(column = "name")]` - Override column name
/// - `#[sqlmodel(nullable)]` - Mark field as nullable (implied by `Option<T>`)
/// - `#[sqlmodel(unique)]` - Add unique constraint
/// - `#[sqlmodel(default = "expr")]` - Set a server-side default SQL expression
/// - `#[sqlmodel(sql_type = "VARCHAR(40)")]` - Spell out the column type
/// - `#[sqlmodel(foreign_key = "table.column")]` - Add foreign key reference
/// - `#[sqlmodel(index = "name")]` - Create a named index on the column
/// - `#[sqlmodel(skip)]` - Keep the field out of the database (filled with `Default`)
///
/// A single `Option<integer>` primary key is treated as auto-incrementing.
///
/// # Example
///
/// ```ignore
/// #[derive(Model)]
/// struct Hero {
///     id: Option<i64>,
///     #[sqlmodel(unique)]
///     name: String,
///     age: Option<i32>,
///     #[sqlmodel(foreign_key = "team.id")]
///     team_id: Option<i64>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(sqlmodel))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    if model.primary_key_fields().is_empty() {
        return syn::Error::new_spanned(
            &input.ident,
            "Model requires a primary key: mark a field with #[sqlmodel(primary_key)] or name it `id`",
        )
        .to_compile_error()
        .into();
    }

    generate_model_impl(&model).into()
}

/// Derive macro for the `Record` trait.
///
/// `#[sqlmodel(scope = "name")]` binds the type to a named engine scope;
/// without it the type uses the default scope.
///
/// ```ignore
/// #[derive(Model, Record)]
/// #[sqlmodel(scope = "analytics")]
/// struct Event { id: Option<i64>, kind: String }
/// ```
#[proc_macro_derive(Record, attributes(sqlmodel))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let attrs = match parse_struct_attrs(&input.attrs) {
        Ok(a) => a,
        Err(e) => return e.to_compile_error().into(),
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let scope = attrs.scope.map(|scope| {
        quote::quote! { const SCOPE: &'static str = #scope; }
    });

    quote::quote! {
        impl #impl_generics sqlmodel_plus::Record for #name #ty_generics #where_clause {
            #scope
        }
    }
    .into()
}

/// Generate the Model trait implementation from parsed model definition.
fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let table_name = &model.table_name;
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();

    let pk_columns: Vec<&str> = model
        .primary_key_fields()
        .iter()
        .map(|f| f.column_name.as_str())
        .collect();

    let field_infos = generate_field_infos(model);
    let to_row_body = generate_to_row(model);
    let from_row_body = generate_from_row(model);
    let pk_value_body = generate_primary_key_value(model);
    let is_new_body = generate_is_new(model);
    let set_generated_id = generate_set_generated_id(model);

    quote::quote! {
        impl #impl_generics sqlmodel_plus_core::Model for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const PRIMARY_KEY: &'static [&'static str] = &[#(#pk_columns),*];

            fn fields() -> &'static [sqlmodel_plus_core::FieldInfo] {
                static FIELDS: &[sqlmodel_plus_core::FieldInfo] = &[
                    #field_infos
                ];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, sqlmodel_plus_core::Value)> {
                #to_row_body
            }

            fn from_row(row: &sqlmodel_plus_core::Row) -> sqlmodel_plus_core::Result<Self> {
                #from_row_body
            }

            fn primary_key_value(&self) -> Vec<sqlmodel_plus_core::Value> {
                #pk_value_body
            }

            fn is_new(&self) -> bool {
                #is_new_body
            }

            #set_generated_id
        }
    }
}

/// Generate the static FieldInfo array contents.
fn generate_field_infos(model: &ModelDef) -> proc_macro2::TokenStream {
    let pk_names: Vec<String> = model
        .primary_key_fields()
        .iter()
        .map(|f| f.name.to_string())
        .collect();

    let field_ts = model.column_fields().into_iter().map(|field| {
        let field_ident = field.name.unraw().to_string();
        let column_name = &field.column_name;
        let primary_key = pk_names.contains(&field.name.to_string());
        let auto_increment = field.auto_increment;
        let nullable = field.nullable;
        let unique = field.unique;

        let sql_type_ts = match &field.sql_type {
            Some(sql_type) => infer::parse_sql_type_attr(sql_type),
            None => infer::infer_sql_type(&field.ty),
        };
        let sql_type_override_ts = option_str(field.sql_type.as_deref());
        let default_ts = option_str(field.default.as_deref());
        let fk_ts = option_str(field.foreign_key.as_deref());
        let index_ts = option_str(field.index.as_deref());

        quote::quote! {
            sqlmodel_plus_core::FieldInfo::new(#field_ident, #column_name, #sql_type_ts)
                .sql_type_override_opt(#sql_type_override_ts)
                .nullable(#nullable)
                .primary_key(#primary_key)
                .auto_increment(#auto_increment)
                .unique(#unique)
                .default_opt(#default_ts)
                .foreign_key_opt(#fk_ts)
                .index_opt(#index_ts)
        }
    });

    quote::quote! { #(#field_ts),* }
}

fn option_str(value: Option<&str>) -> proc_macro2::TokenStream {
    match value {
        Some(s) => quote::quote! { Some(#s) },
        None => quote::quote! { None },
    }
}

/// Generate the to_row method body.
fn generate_to_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let conversions = model.column_fields().into_iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        quote::quote! {
            (#column_name, sqlmodel_plus_core::Value::from(self.#field_name.clone()))
        }
    });

    quote::quote! {
        vec![#(#conversions),*]
    }
}

/// Generate the from_row method body.
fn generate_from_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let extractions = model.fields.iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;

        if field.skip {
            quote::quote! { #field_name: ::core::default::Default::default() }
        } else if parse::is_option_type(&field.ty) {
            // partial selects leave optional columns out
            quote::quote! {
                #field_name: if row.contains_column(#column_name) {
                    row.get_named(#column_name)?
                } else {
                    None
                }
            }
        } else {
            quote::quote! { #field_name: row.get_named(#column_name)? }
        }
    });

    quote::quote! {
        Ok(Self {
            #(#extractions,)*
        })
    }
}

/// Generate the primary_key_value method body.
fn generate_primary_key_value(model: &ModelDef) -> proc_macro2::TokenStream {
    let values = model.primary_key_fields().into_iter().map(|field| {
        let field_name = &field.name;
        quote::quote! { sqlmodel_plus_core::Value::from(self.#field_name.clone()) }
    });

    quote::quote! {
        vec![#(#values),*]
    }
}

/// Generate the is_new method body: any optional key component still unset.
fn generate_is_new(model: &ModelDef) -> proc_macro2::TokenStream {
    let checks: Vec<_> = model
        .primary_key_fields()
        .into_iter()
        .filter(|f| parse::is_option_type(&f.ty))
        .map(|field| {
            let field_name = &field.name;
            quote::quote! { self.#field_name.is_none() }
        })
        .collect();

    if checks.is_empty() {
        quote::quote! { false }
    } else {
        quote::quote! { #(#checks)||* }
    }
}

/// Generate `set_generated_id` for a single optional integer key.
fn generate_set_generated_id(model: &ModelDef) -> proc_macro2::TokenStream {
    let pk = model.primary_key_fields();
    let [field] = pk.as_slice() else {
        return quote::quote! {};
    };
    if !parse::is_option_type(&field.ty) || !infer::is_integer_type(&field.ty) {
        return quote::quote! {};
    }

    let field_name = &field.name;
    let inner = infer::unwrap_option_type(&field.ty);
    quote::quote! {
        fn set_generated_id(&mut self, id: i64) {
            if let Ok(value) = <#inner as ::core::convert::TryFrom<i64>>::try_from(id) {
                self.#field_name = Some(value);
            }
        }
    }
}
