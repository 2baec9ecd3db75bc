//! Derive macro for the `SupportsWeakPtr` trait.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    parse_macro_input, parse_quote, spanned::Spanned, Data, DeriveInput, Field, Fields, Index,
    Member, Path, Type,
};

/// Derives `weakptr::SupportsWeakPtr`.
///
/// The factory field is the one marked `#[weak_factory]`, or, when no field
/// is marked, the only field whose type is named `WeakPtrFactory`. It must
/// be the first field so that it is dropped, and outstanding weak pointers
/// invalidated, before every other field.
///
/// `#[weakptr(crate = path)]` on the type overrides the path to the
/// `weakptr` crate.
#[proc_macro_derive(SupportsWeakPtr, attributes(weak_factory, weakptr))]
pub fn derive_supports_weak_ptr(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let weakptr = crate_path(input)?;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        Data::Enum(data) => {
            return Err(syn::Error::new(
                data.enum_token.span(),
                "SupportsWeakPtr can only be derived for structs",
            ))
        }
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span(),
                "SupportsWeakPtr can only be derived for structs",
            ))
        }
    };

    let (index, field) = find_factory_field(fields, input.ident.span())?;
    if index != 0 {
        return Err(syn::Error::new(
            field.span(),
            "the WeakPtrFactory field must be declared first, so that weak pointers \
             are invalidated before the other fields are dropped",
        ));
    }

    let member = field.ident.clone().map_or_else(
        || {
            Member::Unnamed(Index {
                index: 0,
                span: field.span(),
            })
        },
        Member::Named,
    );

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #weakptr::SupportsWeakPtr for #name #ty_generics #where_clause {
            #[inline]
            fn weak_ptr_factory(&self) -> &#weakptr::WeakPtrFactory<Self> {
                &self.#member
            }
        }
    })
}

fn crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut weakptr: Path = parse_quote!(::weakptr);

    for attr in &input.attrs {
        if !attr.path().is_ident("weakptr") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                weakptr = meta.value()?.parse()?;
                Ok(())
            } else {
                Err(meta.error("unsupported attribute"))
            }
        })?;
    }

    Ok(weakptr)
}

fn find_factory_field(fields: &Fields, span: Span) -> syn::Result<(usize, &Field)> {
    let marked: Vec<_> = fields
        .iter()
        .enumerate()
        .filter(|(_, field)| {
            field
                .attrs
                .iter()
                .any(|attr| attr.path().is_ident("weak_factory"))
        })
        .collect();

    match marked.as_slice() {
        [found] => return Ok(*found),
        [_, second, ..] => {
            return Err(syn::Error::new(
                second.1.span(),
                "only one field may be marked #[weak_factory]",
            ))
        }
        [] => {}
    }

    let mut by_type = fields
        .iter()
        .enumerate()
        .filter(|(_, field)| is_weak_ptr_factory(&field.ty));

    match (by_type.next(), by_type.next()) {
        (Some(found), None) => Ok(found),
        (Some(_), Some(second)) => Err(syn::Error::new(
            second.1.span(),
            "several WeakPtrFactory fields found; mark one with #[weak_factory]",
        )),
        (None, _) => Err(syn::Error::new(
            span,
            "no WeakPtrFactory field found; add one and mark it with #[weak_factory]",
        )),
    }
}

fn is_weak_ptr_factory(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "WeakPtrFactory"),
        _ => false,
    }
}
