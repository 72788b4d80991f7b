//! `#[derive(TsBundle)]` — generate a `TSB{fields}` schema descriptor for a
//! plain Rust struct, the way a wiring-description builder would otherwise
//! have to spell the field table out by hand.
//!
//! ```ignore
//! #[derive(TsBundle)]
//! struct Quote {
//!     #[ts(float)]
//!     bid: f64,
//!     #[ts(float)]
//!     ask: f64,
//!     #[ts(nested = depth_schema)]
//!     depth: Depth,
//! }
//! ```
//!
//! expands to an `impl BundleShape for Quote` whose `ts_bundle_meta()`
//! builds the matching `tsgraph_engine::schema::TsMeta::Bundle` node, with
//! fields in declaration order.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[derive(Clone)]
enum FieldSpec {
    Scalar(&'static str),
    Signal,
    Nested(syn::Path),
}

fn parse_field_spec(attrs: &[syn::Attribute]) -> syn::Result<FieldSpec> {
    let mut spec = None;
    for attr in attrs {
        if !attr.path().is_ident("ts") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("int") {
                spec = Some(FieldSpec::Scalar("Int"));
            } else if meta.path.is_ident("float") {
                spec = Some(FieldSpec::Scalar("Float"));
            } else if meta.path.is_ident("bool") {
                spec = Some(FieldSpec::Scalar("Bool"));
            } else if meta.path.is_ident("text") {
                spec = Some(FieldSpec::Scalar("Text"));
            } else if meta.path.is_ident("bytes") {
                spec = Some(FieldSpec::Scalar("Bytes"));
            } else if meta.path.is_ident("signal") {
                spec = Some(FieldSpec::Signal);
            } else if meta.path.is_ident("nested") {
                let value = meta.value()?;
                let path: syn::Path = value.parse()?;
                spec = Some(FieldSpec::Nested(path));
            } else {
                return Err(meta.error("unrecognised #[ts(...)] field attribute"));
            }
            Ok(())
        })?;
    }
    match spec {
        Some(spec) => Ok(spec),
        None => Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "field needs a #[ts(int|float|bool|text|bytes|signal|nested = path)] attribute",
        )),
    }
}

#[proc_macro_derive(TsBundle, attributes(ts))]
pub fn derive_ts_bundle(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(name, "TsBundle requires named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "TsBundle can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut field_tokens = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let field_name = field.ident.as_ref().unwrap().to_string();
        let spec = match parse_field_spec(&field.attrs) {
            Ok(spec) => spec,
            Err(err) => return err.to_compile_error().into(),
        };
        let meta_expr = match spec {
            FieldSpec::Scalar(kind) => {
                let kind_ident = syn::Ident::new(kind, proc_macro2::Span::call_site());
                quote! {
                    ::tsgraph_engine::schema::TsMeta::scalar(
                        ::tsgraph_engine::value::ScalarKind::#kind_ident,
                    )
                }
            }
            FieldSpec::Signal => quote! { ::tsgraph_engine::schema::TsMeta::signal() },
            FieldSpec::Nested(path) => quote! { #path() },
        };
        field_tokens.push(quote! {
            ::tsgraph_engine::schema::TsField::new(#index, #field_name, #meta_expr)
        });
    }

    let expanded = quote! {
        impl ::tsgraph_engine::schema::BundleShape for #name {
            fn ts_bundle_meta() -> ::tsgraph_engine::schema::TsMeta {
                ::tsgraph_engine::schema::TsMeta::bundle(vec![
                    #(#field_tokens),*
                ])
            }
        }
    };

    expanded.into()
}
