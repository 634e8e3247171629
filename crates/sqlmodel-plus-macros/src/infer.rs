//! SQL type inference from Rust types.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

const INTEGER_TYPES: &[&str] = &["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64"];

/// Infer the SQL type from a Rust type, returning a TokenStream that
/// constructs the appropriate SqlType variant.
///
/// `Option<T>` is unwrapped first. Unknown types fall back to TEXT.
pub fn infer_sql_type(ty: &Type) -> TokenStream {
    let type_str = type_to_string(unwrap_option_type(ty));

    match type_str.as_str() {
        "bool" => quote! { sqlmodel_plus_core::SqlType::Boolean },

        "i8" => quote! { sqlmodel_plus_core::SqlType::TinyInt },
        "i16" => quote! { sqlmodel_plus_core::SqlType::SmallInt },
        "i32" => quote! { sqlmodel_plus_core::SqlType::Integer },
        "i64" => quote! { sqlmodel_plus_core::SqlType::BigInt },

        // Unsigned integers map to the next larger signed type
        "u8" => quote! { sqlmodel_plus_core::SqlType::SmallInt },
        "u16" => quote! { sqlmodel_plus_core::SqlType::Integer },
        "u32" | "u64" => quote! { sqlmodel_plus_core::SqlType::BigInt },

        "f32" => quote! { sqlmodel_plus_core::SqlType::Real },
        "f64" => quote! { sqlmodel_plus_core::SqlType::Double },

        "String" => quote! { sqlmodel_plus_core::SqlType::Text },

        "Vec<u8>" => quote! { sqlmodel_plus_core::SqlType::Blob },

        "serde_json::Value" => quote! { sqlmodel_plus_core::SqlType::Json },

        _ => quote! { sqlmodel_plus_core::SqlType::Text },
    }
}

/// Parse an explicit sql_type attribute string into a SqlType TokenStream.
pub fn parse_sql_type_attr(sql_type: &str) -> TokenStream {
    let upper = sql_type.trim().to_uppercase();

    if let Some(len) = upper
        .strip_prefix("VARCHAR(")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(|len| len.trim().parse::<u32>().ok())
    {
        return quote! { sqlmodel_plus_core::SqlType::VarChar(#len) };
    }

    match upper.as_str() {
        "TINYINT" => quote! { sqlmodel_plus_core::SqlType::TinyInt },
        "SMALLINT" | "INT2" => quote! { sqlmodel_plus_core::SqlType::SmallInt },
        "INTEGER" | "INT" | "INT4" => quote! { sqlmodel_plus_core::SqlType::Integer },
        "BIGINT" | "INT8" => quote! { sqlmodel_plus_core::SqlType::BigInt },
        "REAL" | "FLOAT4" => quote! { sqlmodel_plus_core::SqlType::Real },
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => {
            quote! { sqlmodel_plus_core::SqlType::Double }
        }
        "BOOLEAN" | "BOOL" => quote! { sqlmodel_plus_core::SqlType::Boolean },
        "TEXT" => quote! { sqlmodel_plus_core::SqlType::Text },
        "BLOB" | "BYTEA" => quote! { sqlmodel_plus_core::SqlType::Blob },
        "JSON" => quote! { sqlmodel_plus_core::SqlType::Json },
        _ => {
            let custom = sql_type;
            quote! { sqlmodel_plus_core::SqlType::Custom(#custom) }
        }
    }
}

/// Whether the type (after unwrapping `Option`) is a primitive integer.
pub fn is_integer_type(ty: &Type) -> bool {
    INTEGER_TYPES.contains(&type_to_string(unwrap_option_type(ty)).as_str())
}

/// Unwrap Option<T> to get the inner type, or return the original type.
pub fn unwrap_option_type(ty: &Type) -> &Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return inner;
                    }
                }
            }
        }
    }
    ty
}

/// Convert a Type to a simplified string representation for matching.
fn type_to_string(ty: &Type) -> String {
    use quote::ToTokens;
    ty.to_token_stream().to_string().replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_infer_primitives() {
        let ty: Type = parse_quote!(i32);
        assert!(infer_sql_type(&ty).to_string().contains("Integer"));

        let ty: Type = parse_quote!(Option<i64>);
        assert!(infer_sql_type(&ty).to_string().contains("BigInt"));

        let ty: Type = parse_quote!(Vec<u8>);
        assert!(infer_sql_type(&ty).to_string().contains("Blob"));

        let ty: Type = parse_quote!(std::net::IpAddr);
        assert!(infer_sql_type(&ty).to_string().contains("Text"));
    }

    #[test]
    fn test_parse_sql_type_attr() {
        assert!(parse_sql_type_attr("varchar(100)").to_string().contains("VarChar"));
        assert!(parse_sql_type_attr("INTEGER").to_string().contains("Integer"));
        assert!(parse_sql_type_attr("NUMERIC(10, 2)").to_string().contains("Custom"));
    }

    #[test]
    fn test_is_integer_type() {
        assert!(is_integer_type(&parse_quote!(Option<i32>)));
        assert!(is_integer_type(&parse_quote!(u64)));
        assert!(!is_integer_type(&parse_quote!(Option<String>)));
    }
}
