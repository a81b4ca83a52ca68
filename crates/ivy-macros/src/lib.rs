use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, FnArg, GenericParam, Generics, Ident, ItemFn, Pat, PatType,
    ReturnType, Type, TypeParamBound,
};

const FN_TRAITS: [&str; 3] = ["Fn", "FnMut", "FnOnce"];

/// How a parameter reaches the function body on each build.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// Cloned out of the view struct. Takes part in the memo snapshot.
    Owned,
    /// Cloned, but closures never compare equal, so memoization is off.
    Shared,
    /// Passed by reference. Boxed closures and generic `Fn` values cannot be
    /// cloned.
    Borrowed,
}

struct Param {
    ident: Ident,
    pat: Box<Pat>,
    ty: Box<Type>,
    binding: Binding,
}

fn is_fn_bound(bound: &TypeParamBound) -> bool {
    if let TypeParamBound::Trait(trait_bound) = bound {
        if let Some(segment) = trait_bound.path.segments.last() {
            return FN_TRAITS.iter().any(|name| segment.ident == *name);
        }
    }
    false
}

/// `Box<dyn Fn..>`, `Rc<dyn Fn..>` and friends, where the wrapper's last path
/// segment is one of `wrappers`.
fn is_wrapped_fn_object(ty: &Type, wrappers: &[&str]) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    if !wrappers.iter().any(|wrapper| segment.ident == *wrapper) {
        return false;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(Type::TraitObject(object))) => {
            object.bounds.iter().any(is_fn_bound)
        }
        _ => false,
    }
}

/// A bare type parameter bounded by an `Fn` trait, inline or in the where
/// clause.
fn is_generic_fn_like(ty: &Type, generics: &Generics) -> bool {
    let type_ident = match ty {
        Type::Path(type_path) if type_path.qself.is_none() && type_path.path.segments.len() == 1 => {
            &type_path.path.segments[0].ident
        }
        _ => return false,
    };

    let inline = generics.params.iter().any(|param| match param {
        GenericParam::Type(type_param) => {
            type_param.ident == *type_ident && type_param.bounds.iter().any(is_fn_bound)
        }
        _ => false,
    });
    if inline {
        return true;
    }

    generics.where_clause.as_ref().is_some_and(|where_clause| {
        where_clause.predicates.iter().any(|predicate| match predicate {
            syn::WherePredicate::Type(pred) => {
                let bounded = match &pred.bounded_ty {
                    Type::Path(bounded) => bounded.path.is_ident(type_ident),
                    _ => false,
                };
                bounded && pred.bounds.iter().any(is_fn_bound)
            }
            _ => false,
        })
    })
}

fn classify(ty: &Type, generics: &Generics) -> Binding {
    if matches!(ty, Type::BareFn(_)) || is_wrapped_fn_object(ty, &["Rc", "Arc"]) {
        Binding::Shared
    } else if is_wrapped_fn_object(ty, &["Box"]) || is_generic_fn_like(ty, generics) {
        Binding::Borrowed
    } else {
        Binding::Owned
    }
}

fn is_render_context(ty: &Type) -> bool {
    let Type::Reference(reference) = ty else {
        return false;
    };
    if reference.mutability.is_none() {
        return false;
    }
    match &*reference.elem {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "RenderContext"),
        _ => false,
    }
}

fn view_name(ident: &Ident) -> Ident {
    let name: String = ident
        .to_string()
        .trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    Ident::new(&name, ident.span())
}

fn parse_memo_flag(attr: TokenStream2) -> syn::Result<bool> {
    if attr.is_empty() {
        return Ok(false);
    }
    let ident: Ident = syn::parse2(attr)?;
    if ident == "memo" {
        Ok(true)
    } else {
        Err(syn::Error::new_spanned(
            ident,
            "unsupported component attribute, expected `memo`",
        ))
    }
}

/// Turns a render function into an `ivy_core::View`.
///
/// ```ignore
/// #[component(memo)]
/// fn greeting(cx: &mut RenderContext<'_>, name: String) -> Element { .. }
/// ```
///
/// expands to a `Greeting { name }` struct implementing `View`, plus a
/// `greeting(name)` constructor returning an `Element`. The optional first
/// parameter receives the render context. Every other parameter becomes a
/// field and is cloned into the body on each build, except boxed or generic
/// `Fn` values, which are passed by reference.
///
/// With `memo`, the view skips rebuilding while its parameters compare equal
/// to the previous build. Closure parameters cannot be compared, so their
/// presence turns memoization off.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);
    match parse_memo_flag(attr.into()).and_then(|memo| expand(memo, func)) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(memo: bool, func: ItemFn) -> syn::Result<TokenStream2> {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "components render synchronously; use `use_effect_async` for async work",
        ));
    }
    if let Some(lifetime) = sig.generics.lifetimes().next() {
        return Err(syn::Error::new_spanned(
            lifetime,
            "component parameters are stored in the view and cannot borrow",
        ));
    }
    let return_ty = match &sig.output {
        ReturnType::Type(_, ty) => ty.clone(),
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "a component must return a value convertible into `Element`",
            ))
        }
    };

    let mut inputs = sig.inputs.iter().peekable();
    let context: Option<PatType> = match inputs.peek() {
        Some(FnArg::Typed(pat_type)) if is_render_context(&pat_type.ty) => {
            let pat_type = pat_type.clone();
            inputs.next();
            Some(pat_type)
        }
        _ => None,
    };

    let mut params = Vec::new();
    for input in inputs {
        let pat_type = match input {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "components cannot take `self`",
                ))
            }
        };
        if is_render_context(&pat_type.ty) {
            return Err(syn::Error::new_spanned(
                pat_type,
                "the render context must be the first parameter",
            ));
        }
        if matches!(*pat_type.ty, Type::ImplTrait(_)) {
            return Err(syn::Error::new_spanned(
                &pat_type.ty,
                "`impl Trait` parameters cannot be stored in a view; use a named generic parameter",
            ));
        }
        let ident = match &*pat_type.pat {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "component parameters must be plain identifiers",
                ))
            }
        };
        params.push(Param {
            binding: classify(&pat_type.ty, &sig.generics),
            ident,
            pat: pat_type.pat.clone(),
            ty: pat_type.ty.clone(),
        });
    }

    let fn_ident = &sig.ident;
    let name = view_name(fn_ident);
    let render_ident = format_ident!("__ivy_render_{}", fn_ident);
    let docs: Vec<_> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .collect();

    let generics = &sig.generics;
    let (_, ty_generics, where_clause) = generics.split_for_impl();
    let mut static_generics = generics.clone();
    let type_params: Vec<Ident> = generics
        .type_params()
        .map(|param| param.ident.clone())
        .collect();
    {
        let predicates = &mut static_generics.make_where_clause().predicates;
        for ident in &type_params {
            predicates.push(parse_quote!(#ident: 'static));
        }
    }
    let (impl_generics, _, static_where) = static_generics.split_for_impl();

    let fields = params.iter().map(|param| {
        let Param { ident, ty, .. } = param;
        quote! { #vis #ident: #ty }
    });

    let context_input = match &context {
        Some(pat_type) => quote! { #pat_type },
        None => quote! { _: &mut ::ivy_core::RenderContext<'_> },
    };
    let render_inputs = params.iter().map(|param| {
        let Param { pat, ty, .. } = param;
        match param.binding {
            Binding::Borrowed => quote! { #pat: &#ty },
            Binding::Owned | Binding::Shared => quote! { #pat: #ty },
        }
    });
    let render_args = params.iter().map(|param| {
        let ident = &param.ident;
        match param.binding {
            Binding::Borrowed => quote! { &self.#ident },
            Binding::Owned | Binding::Shared => quote! { ::core::clone::Clone::clone(&self.#ident) },
        }
    });

    let memo_fn = if memo && params.iter().all(|param| param.binding == Binding::Owned) {
        let idents = params.iter().map(|param| &param.ident);
        quote! {
            fn memo(&self) -> ::core::option::Option<::ivy_core::Memo> {
                ::core::option::Option::Some(::ivy_core::Memo::new((
                    #(::core::clone::Clone::clone(&self.#idents),)*
                )))
            }
        }
    } else {
        quote! {}
    };

    let ctor_inputs = params.iter().map(|param| {
        let Param { ident, ty, .. } = param;
        quote! { #ident: #ty }
    });
    let ctor_fields = params.iter().map(|param| &param.ident);

    Ok(quote! {
        #(#docs)*
        #vis struct #name #generics #where_clause {
            #(#fields,)*
        }

        impl #impl_generics ::ivy_core::View for #name #ty_generics #static_where {
            fn build(&self, __cx: &mut ::ivy_core::RenderContext<'_>) -> ::ivy_core::Element {
                #[allow(clippy::too_many_arguments, clippy::needless_pass_by_value)]
                fn #render_ident #generics (
                    #context_input,
                    #(#render_inputs),*
                ) -> #return_ty #where_clause #block

                ::core::convert::Into::<::ivy_core::Element>::into(
                    #render_ident(__cx, #(#render_args),*)
                )
            }

            #memo_fn
        }

        #(#attrs)*
        #[allow(dead_code)]
        #vis fn #fn_ident #impl_generics (#(#ctor_inputs),*) -> ::ivy_core::Element #static_where {
            ::ivy_core::Element::view(#name { #(#ctor_fields),* })
        }
    })
}
