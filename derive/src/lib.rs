//! Derive macro for strata's `FromProperties` binding.
//!
//! Expands a struct definition into a field-by-field bind: tagged fields
//! (`#[value("${key:=default}>>splitter")]`) compose their key onto the
//! parent key, untagged fields synthesize a key from the field name
//! (lowercased, `_` → `.`), `#[value(flatten)]` embeds a nested aggregate at
//! the parent key, and `#[value(skip)]` leaves the field at its `Default`.
//! An `#[expr("…")]` directive rides along in the annotation string the
//! validator consults after a successful scalar bind.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr, parse_macro_input};

#[proc_macro_derive(FromProperties, attributes(value, expr))]
pub fn derive_from_properties(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FromProperties can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FromProperties requires named fields",
        ));
    };

    let ident = &input.ident;
    let inits = fields
        .named
        .iter()
        .map(field_init)
        .collect::<syn::Result<Vec<_>>>()?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::strata::FromProperties for #ident #ty_generics #where_clause {
            fn from_properties(
                p: &::strata::Properties,
                param: ::strata::BindParam,
            ) -> ::core::result::Result<Self, ::strata::ConfError> {
                ::strata::bind::reject_struct_default(&param)?;
                ::core::result::Result::Ok(Self {
                    #(#inits,)*
                })
            }
        }
    })
}

enum ValueAttr {
    Tag(String),
    Flatten,
    Skip,
}

fn value_attr(field: &Field) -> syn::Result<Option<ValueAttr>> {
    for attr in &field.attrs {
        if !attr.path().is_ident("value") {
            continue;
        }
        if let Ok(lit) = attr.parse_args::<LitStr>() {
            return Ok(Some(ValueAttr::Tag(lit.value())));
        }
        let word = attr.parse_args::<syn::Ident>().map_err(|_| {
            syn::Error::new_spanned(
                attr,
                "expected #[value(\"${key:=default}>>splitter\")], #[value(flatten)] or #[value(skip)]",
            )
        })?;
        return match word.to_string().as_str() {
            "flatten" => Ok(Some(ValueAttr::Flatten)),
            "skip" => Ok(Some(ValueAttr::Skip)),
            _ => Err(syn::Error::new_spanned(
                &word,
                "expected `flatten` or `skip`",
            )),
        };
    }
    Ok(None)
}

fn expr_attr(field: &Field) -> syn::Result<Option<String>> {
    for attr in &field.attrs {
        if attr.path().is_ident("expr") {
            return Ok(Some(attr.parse_args::<LitStr>()?.value()));
        }
    }
    Ok(None)
}

fn field_init(field: &Field) -> syn::Result<proc_macro2::TokenStream> {
    let ident = field.ident.as_ref().expect("named field");
    let ty = &field.ty;
    let raw = ident.to_string();
    let name = raw.strip_prefix("r#").unwrap_or(&raw).to_string();

    let expr = expr_attr(field)?;
    let reject_expr = |kind: &str| {
        syn::Error::new_spanned(
            ident,
            format!("#[expr] requires a #[value(\"…\")] tag, not {kind}"),
        )
    };

    match value_attr(field)? {
        Some(ValueAttr::Skip) => {
            if expr.is_some() {
                return Err(reject_expr("#[value(skip)]"));
            }
            Ok(quote! { #ident: ::core::default::Default::default() })
        }
        Some(ValueAttr::Flatten) => {
            if expr.is_some() {
                return Err(reject_expr("#[value(flatten)]"));
            }
            Ok(quote! {
                #ident: {
                    let sub = ::strata::BindParam::child(&param, #name);
                    <#ty as ::strata::FromProperties>::from_properties(p, sub)
                        .map_err(|e| ::strata::ConfError::bind_context(&param.path, e))?
                }
            })
        }
        Some(ValueAttr::Tag(tag)) => {
            let annotation = match &expr {
                Some(directive) => format!("value:\"{tag}\" expr:\"{directive}\""),
                None => format!("value:\"{tag}\""),
            };
            Ok(quote! {
                #ident: {
                    let mut sub = ::strata::BindParam::child(&param, #name);
                    sub.bind_tag(#tag, #annotation)
                        .map_err(|e| ::strata::ConfError::bind_context(&param.path, e))?;
                    <#ty as ::strata::FromProperties>::from_properties(p, sub)
                        .map_err(|e| ::strata::ConfError::bind_context(&param.path, e))?
                }
            })
        }
        None => {
            if expr.is_some() {
                return Err(reject_expr("an untagged field"));
            }
            let key_part = name.to_lowercase().replace('_', ".");
            Ok(quote! {
                #ident: {
                    let mut sub = ::strata::BindParam::child(&param, #name);
                    sub.key = ::strata::bind::join_key(&param.key, #key_part);
                    <#ty as ::strata::FromProperties>::from_properties(p, sub)
                        .map_err(|e| ::strata::ConfError::bind_context(&param.path, e))?
                }
            })
        }
    }
}
