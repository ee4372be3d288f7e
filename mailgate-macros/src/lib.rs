extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitInt, Variant};

/// Derive macro mapping each error variant to an HTTP status code
///
/// Every variant needs a `#[http_status(...)]` attribute holding either a
/// `StatusCode` constant name (e.g. `BAD_REQUEST`) or a number (e.g. `400`).
/// The derived `http_status()` method returns the matching `http::StatusCode`,
/// so the deriving crate must depend on `http`.
///
/// The user-facing message is left to `Display` (usually via `thiserror`).
///
/// ### Example
///
/// ```ignore
/// #[derive(Debug, thiserror::Error, mailgate::HttpStatus)]
/// enum ApiError {
///     #[error("Malformed Token")]
///     #[http_status(UNAUTHORIZED)]
///     Unauthorized,
///
///     #[error("failed to parse request: {0}")]
///     #[http_status(400)]
///     RequestFormat(String),
///
///     #[error("failed to send mail to {to}: {source}")]
///     #[http_status(INTERNAL_SERVER_ERROR)]
///     Relay { to: String, source: RelayError },
/// }
///
/// assert_eq!(ApiError::Unauthorized.http_status(), StatusCode::UNAUTHORIZED);
/// ```
#[proc_macro_derive(HttpStatus, attributes(http_status))]
pub fn http_status_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

enum Status {
    Named(Ident),
    Code(u16),
}

impl Parse for Status {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let lookahead = input.lookahead1();
        if lookahead.peek(LitInt) {
            let lit: LitInt = input.parse()?;
            let code = lit.base10_parse::<u16>()?;
            if !(100..=999).contains(&code) {
                return Err(syn::Error::new(
                    lit.span(),
                    "HTTP status code must be within 100..=999",
                ));
            }
            Ok(Status::Code(code))
        } else if lookahead.peek(Ident) {
            Ok(Status::Named(input.parse()?))
        } else {
            Err(lookahead.error())
        }
    }
}

impl ToTokens for Status {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let expr = match self {
            Status::Named(name) => quote! { http::StatusCode::#name },
            // range is checked at expansion time, the fallback is unreachable
            Status::Code(code) => quote! {
                http::StatusCode::from_u16(#code)
                    .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
            },
        };
        tokens.extend(expr);
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "HttpStatus can only be derived for enums",
        ));
    };

    let arms = data
        .variants
        .iter()
        .map(|variant| {
            let status = variant_status(variant)?;
            let ident = &variant.ident;
            let pattern = match &variant.fields {
                Fields::Unit => quote! { Self::#ident },
                Fields::Unnamed(_) => quote! { Self::#ident(..) },
                Fields::Named(_) => quote! { Self::#ident { .. } },
            };
            Ok(quote! { #pattern => #status, })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            pub fn http_status(&self) -> http::StatusCode {
                match *self {
                    #(#arms)*
                }
            }
        }
    })
}

fn variant_status(variant: &Variant) -> syn::Result<Status> {
    let mut status = None;
    for attr in &variant.attrs {
        if !attr.path().is_ident("http_status") {
            continue;
        }
        if status.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "duplicate #[http_status] attribute",
            ));
        }
        status = Some(attr.parse_args::<Status>()?);
    }
    status.ok_or_else(|| {
        syn::Error::new_spanned(
            &variant.ident,
            "missing #[http_status(...)] attribute on variant",
        )
    })
}
