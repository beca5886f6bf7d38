//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//! Replacement for the `thiserror` crate, pared down to the error shape this
//! workspace uses: enums whose variants are unit-like or carry named fields.
//! Tuple variants are rejected so every message interpolates by field name.
//!
//! # Usage
//!
//! ```ignore
//! use owl_vm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VmError {
//!     #[error("memory access out of range: {len} byte(s) at {addr:#010x}")]
//!     OutOfRangeAccess { addr: u32, len: u32 },
//!
//!     #[error("unknown syscall selector {selector}")]
//!     UnknownSyscall { selector: u32 },
//!
//!     #[error("machine halted")]
//!     Halted,
//! }
//! ```
//!
//! Every variant declares its display message with `#[error("...")]`; the
//! message must mention each of the variant's fields by name, since the
//! generated `write!` passes all of them as named arguments.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derives `Display` and `Error` for an error enum.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Error derive supports enums only",
        ));
    };

    let arms = data
        .variants
        .iter()
        .map(display_arm)
        .collect::<syn::Result<Vec<_>>>()?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds the `match` arm formatting one variant.
fn display_arm(variant: &syn::Variant) -> syn::Result<TokenStream2> {
    let name = &variant.ident;
    let message = error_message(variant)?;

    match &variant.fields {
        Fields::Unit => Ok(quote! {
            Self::#name => write!(f, #message),
        }),
        Fields::Named(fields) => {
            let field_names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            Ok(quote! {
                Self::#name { #(#field_names),* } => {
                    write!(f, #message, #(#field_names = #field_names),*)
                }
            })
        }
        Fields::Unnamed(_) => Err(syn::Error::new_spanned(
            variant,
            "Error variants carry named fields or no fields; name the fields \
             so the message can interpolate them",
        )),
    }
}

/// Pulls the message out of a variant's `#[error("...")]` attribute.
fn error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if attr.path().is_ident("error") {
            let message: LitStr = attr.parse_args().map_err(|_| {
                syn::Error::new_spanned(
                    attr,
                    "expected a string literal, e.g. #[error(\"unknown syscall selector {selector}\")]",
                )
            })?;
            return Ok(message.value());
        }
    }

    Err(syn::Error::new_spanned(
        variant,
        format!(
            "variant `{}` is missing its #[error(\"...\")] display message",
            variant.ident
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(source: &str) -> syn::Result<TokenStream2> {
        expand(&syn::parse_str::<DeriveInput>(source).unwrap())
    }

    #[test]
    fn named_field_variant_interpolates_by_name() {
        let tokens = expand_str(
            r#"
            enum E {
                #[error("bad word {word:#010x}")]
                BadWord { word: u32 },
            }
            "#,
        )
        .unwrap()
        .to_string();

        assert!(tokens.contains("impl :: std :: fmt :: Display for E"));
        assert!(tokens.contains("impl :: std :: error :: Error for E"));
        assert!(tokens.contains("word = word"));
    }

    #[test]
    fn multi_field_variant_passes_every_field() {
        let tokens = expand_str(
            r#"
            enum E {
                #[error("{len} byte(s) at {addr}")]
                OutOfRange { addr: u32, len: u32 },
            }
            "#,
        )
        .unwrap()
        .to_string();

        assert!(tokens.contains("addr = addr"));
        assert!(tokens.contains("len = len"));
    }

    #[test]
    fn unit_variant_uses_the_message_verbatim() {
        let tokens = expand_str(
            r#"
            enum E {
                #[error("machine halted")]
                Halted,
            }
            "#,
        )
        .unwrap()
        .to_string();

        assert!(tokens.contains("\"machine halted\""));
    }

    #[test]
    fn variant_without_a_message_is_rejected() {
        let err = expand_str("enum E { Halted, }").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn non_string_message_is_rejected() {
        let err = expand_str(
            r#"
            enum E {
                #[error(halted)]
                Halted,
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("string literal"));
    }

    #[test]
    fn tuple_variants_are_rejected() {
        let err = expand_str(
            r#"
            enum E {
                #[error("bad {0}")]
                Bad(u32),
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("named fields"));
    }

    #[test]
    fn non_enum_types_are_rejected() {
        let err = expand_str("struct S;").unwrap_err();
        assert!(err.to_string().contains("enums only"));
    }
}
