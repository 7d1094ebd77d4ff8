// Common utility functions shared by the derive macros

/// Convert a darling error to a TokenStream that can be returned from a proc_macro function
pub fn darling_error(error: darling::Error) -> proc_macro::TokenStream {
    error.write_errors().into()
}

/// Name of the generated kind enum: `<Message>Kind` unless overridden
pub fn kind_ident(message: &syn::Ident, custom: Option<&str>) -> syn::Ident {
    match custom {
        Some(name) => syn::Ident::new(name, message.span()),
        None => quote::format_ident!("{}Kind", message),
    }
}
