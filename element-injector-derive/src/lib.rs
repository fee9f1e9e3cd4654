//! Derive macro for element-injector
//!
//! `#[derive(Element)]` generates a `Describe` implementation, so a struct
//! can be registered in a `TypeRegistry` without writing its descriptor by
//! hand.
//!
//! # Example
//!
//! ```rust,ignore
//! use element_injector::{Element, Injected};
//!
//! #[derive(Element)]
//! #[element(name = "users", post_init = "ready", profile = "dev")]
//! struct UserService {
//!     #[inject]
//!     db: Injected<Database>,
//!     #[inject(name = "audit")]
//!     audit: Injected<dyn Audit>,
//!     #[inject_property("users.page-size")]
//!     page_size: Injected<String>,
//!     // Non-injected fields use Default
//!     requests: std::sync::atomic::AtomicU64,
//! }
//!
//! impl UserService {
//!     fn ready(&self) {}
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Type, parse_macro_input};

/// Derive `Describe` for a struct with named fields.
///
/// # Struct attributes
///
/// `#[element(...)]`, all optional:
/// - `name = "..."` - element name, defaults to the type's full name
/// - `scope = "singleton" | "prototype"`
/// - `post_init = "method"` - a `&self` method invoked after field injection
/// - `profile = "..."` - restrict to a profile; may be given several times
///
/// # Field attributes
///
/// - `#[inject]` / `#[inject(name = "...")]` - inject an element into an `Injected<T>` field
/// - `#[inject_property("key")]` - inject a property into an `Injected<T>` field
///
/// The generated constructor is public, takes no parameters and
/// initializes every field with `Default::default()`.
#[proc_macro_derive(Element, attributes(element, inject, inject_property))]
pub fn derive_element(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ElementAttr {
    name: Option<LitStr>,
    prototype: bool,
    post_init: Option<LitStr>,
    profiles: Vec<LitStr>,
}

enum InjectAttr {
    Element(Option<LitStr>),
    Property(LitStr),
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Element cannot be derived for generic structs",
        ));
    }

    // Only support structs with named fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Element can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(input, "Element can only be derived for structs"));
        }
    };

    let element = parse_element_attr(&input.attrs)?;

    let mut element_tag = quote! { ::element_injector::tags::element() };
    if let Some(element_name) = &element.name {
        element_tag = quote! { #element_tag.named(#element_name) };
    }
    if element.prototype {
        element_tag = quote! { #element_tag.scoped(::element_injector::ElementScope::Prototype) };
    }

    let profile_tags = element.profiles.iter().map(|profile| {
        quote! { .tag(::element_injector::tags::profile(#profile)) }
    });

    let mut field_inits = Vec::new();
    let mut slots = Vec::new();
    let mut field_descriptors = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        field_inits.push(quote! { #field_name: ::std::default::Default::default() });

        let Some(inject) = parse_inject_attr(&field.attrs)? else {
            continue;
        };
        let Some(inner) = extract_injected_inner_type(&field.ty) else {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "Fields marked with #[inject] or #[inject_property] must have type Injected<T>",
            ));
        };

        let tag = match inject {
            InjectAttr::Element(None) => quote! { ::element_injector::tags::inject() },
            InjectAttr::Element(Some(target)) => quote! { ::element_injector::tags::inject_named(#target) },
            InjectAttr::Property(key) => quote! { ::element_injector::tags::inject_property(#key) },
        };
        let slot = syn::Ident::new(&format!("__slot_{}", field_name), field_name.span());
        let field_label = field_name.to_string();

        slots.push(quote! {
            fn #slot(target: &#name) -> &::element_injector::Injected<#inner> {
                &target.#field_name
            }
        });
        field_descriptors.push(quote! {
            .field::<#inner>(::element_injector::Field::named(#field_label).tag(#tag), #slot)
        });
    }

    let post_init = element.post_init.as_ref().map(|method| {
        let ident = syn::Ident::new(&method.value(), method.span());
        quote! {
            .method(
                ::element_injector::Method::public(#method).tag(::element_injector::tags::post_initialization()),
                |target: &#name, _args: &::element_injector::Args| {
                    let _ = target.#ident();
                    Ok(())
                },
            )
        }
    });

    Ok(quote! {
        impl ::element_injector::Describe for #name {
            fn describe() -> ::element_injector::TypeDescriptor {
                #(#slots)*

                ::element_injector::TypeDescriptor::class::<#name>()
                    .tag(#element_tag)
                    #(#profile_tags)*
                    .constructor(::element_injector::Constructor::public(), |_args: &::element_injector::Args| {
                        Ok(#name {
                            #(#field_inits),*
                        })
                    })
                    #(#field_descriptors)*
                    #post_init
                    .build()
            }
        }
    })
}

/// Parse every `#[element(...)]` attribute on the struct.
fn parse_element_attr(attrs: &[Attribute]) -> syn::Result<ElementAttr> {
    let mut parsed = ElementAttr::default();
    for attr in attrs {
        if !attr.path().is_ident("element") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("scope") {
                let scope: LitStr = meta.value()?.parse()?;
                parsed.prototype = match scope.value().as_str() {
                    "singleton" => false,
                    "prototype" => true,
                    _ => return Err(syn::Error::new_spanned(scope, "scope must be \"singleton\" or \"prototype\"")),
                };
            } else if meta.path.is_ident("post_init") {
                parsed.post_init = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("profile") {
                parsed.profiles.push(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected name, scope, post_init or profile"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

/// Find and parse `#[inject]`, `#[inject(name = "...")]` or `#[inject_property("...")]`.
fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    for attr in attrs {
        if attr.path().is_ident("inject") {
            if attr.meta.require_path_only().is_ok() {
                return Ok(Some(InjectAttr::Element(None)));
            }
            let mut target = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    target = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected name"))
                }
            })?;
            return Ok(Some(InjectAttr::Element(target)));
        }
        if attr.path().is_ident("inject_property") {
            return Ok(Some(InjectAttr::Property(attr.parse_args::<LitStr>()?)));
        }
    }
    Ok(None)
}

/// Extract T from Injected<T>
fn extract_injected_inner_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == "Injected" {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}
