use darling::{ast, FromDeriveInput, FromVariant};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Generics, Ident, Visibility};

use crate::common::kind_ident;

/// Per-variant options
#[derive(Debug, FromVariant)]
#[darling(attributes(message))]
pub struct MessageVariant {
    ident: Ident,
    /// Name reported by `MessageKind::name`, defaults to the variant name
    #[darling(default)]
    name: Option<String>,
}

/// Container options for `#[derive(Message)]`
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(message), supports(enum_any))]
pub struct MessageInput {
    ident: Ident,
    vis: Visibility,
    generics: Generics,
    data: ast::Data<MessageVariant, ()>,
    /// Name of the generated kind enum
    #[darling(default)]
    kind: Option<String>,
}

/// Build the kind enum and both trait impls for a message enum.
pub fn expand(input: &DeriveInput) -> darling::Result<TokenStream> {
    let parsed = MessageInput::from_derive_input(input)?;
    let variants = parsed
        .data
        .take_enum()
        .ok_or_else(|| darling::Error::custom("Message can only be derived for enums"))?;

    if variants.is_empty() {
        return Err(darling::Error::custom("Message requires at least one variant")
            .with_span(&parsed.ident));
    }

    let name = &parsed.ident;
    let vis = &parsed.vis;
    let kind = kind_ident(name, parsed.kind.as_deref());
    let (impl_generics, ty_generics, where_clause) = parsed.generics.split_for_impl();

    let idents: Vec<&Ident> = variants.iter().map(|v| &v.ident).collect();
    let names: Vec<String> = variants
        .iter()
        .map(|v| v.name.clone().unwrap_or_else(|| v.ident.to_string()))
        .collect();

    let doc = format!("Kind tag of [`{}`] messages.", name);

    Ok(quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #kind {
            #( #idents ),*
        }

        impl ::zdopt_api::MessageKind for #kind {
            fn name(&self) -> &'static str {
                match self {
                    #( #kind::#idents => #names ),*
                }
            }

            fn all() -> &'static [Self] {
                &[ #( #kind::#idents ),* ]
            }
        }

        impl #impl_generics ::zdopt_api::Message for #name #ty_generics #where_clause {
            type Kind = #kind;

            fn kind(&self) -> #kind {
                match self {
                    #( #name::#idents { .. } => #kind::#idents ),*
                }
            }
        }
    })
}
