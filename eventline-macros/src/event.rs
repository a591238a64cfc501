use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DataEnum, DataStruct, DeriveInput, Fields, Result};

const TAG: &str = "tag";

fn is_tag_field(field: &syn::Field) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(TAG))
}

pub fn event_inner(ast: &DeriveInput) -> Result<TokenStream> {
    match ast.data {
        Data::Enum(ref data) => impl_enum(ast, data),
        Data::Struct(ref data) => impl_struct(ast, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &ast.ident,
            "Event cannot be derived for a union",
        )),
    }
}

fn impl_enum(ast: &DeriveInput, data: &DataEnum) -> Result<TokenStream> {
    let name = &ast.ident;

    let event_type_arms = data.variants.iter().map(|variant| {
        let variant_ident = &variant.ident;
        let event_type = variant_ident.to_string();
        quote! {
            #name::#variant_ident { .. } => #event_type,
        }
    });

    let tags_arms = data
        .variants
        .iter()
        .map(|variant| tags_arm_for_fields(&variant.fields, &variant.ident, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl eventline::Event for #name {
            fn event_type(&self) -> &'static str {
                match self {
                    #(#event_type_arms)*
                }
            }

            fn tags(&self) -> eventline::TagSet {
                match self {
                    #(#tags_arms)*
                }
            }
        }
    })
}

fn tags_arm_for_fields(
    fields: &Fields,
    variant_ident: &syn::Ident,
    enum_name: &syn::Ident,
) -> Result<TokenStream> {
    match fields {
        Fields::Named(named) => {
            let tag_fields: Vec<_> = named
                .named
                .iter()
                .filter(|f| is_tag_field(f))
                .map(|f| f.ident.as_ref().expect("named field"))
                .collect();
            let all_fields: Vec<_> = named
                .named
                .iter()
                .map(|f| f.ident.as_ref().expect("named field"))
                .collect();
            let tag_inserts = tag_fields.iter().map(|field| {
                let key = field.to_string();
                quote! { set.insert(eventline::Tag::new(#key, #field.to_string()).expect("tag value must be non-empty")); }
            });
            Ok(quote! {
                #enum_name::#variant_ident { #(#all_fields,)* } => {
                    let mut set = eventline::TagSet::new();
                    #(#tag_inserts)*
                    set
                },
            })
        }
        Fields::Unnamed(_) => Err(syn::Error::new_spanned(
            variant_ident,
            "Event does not support tuple variants; use named fields with #[tag]",
        )),
        Fields::Unit => Ok(quote! {
            #enum_name::#variant_ident => eventline::TagSet::new(),
        }),
    }
}

fn impl_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    let event_type = name.to_string();

    let tag_fields: Vec<_> = match &data.fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter(|f| is_tag_field(f))
            .map(|f| f.ident.as_ref().expect("named field"))
            .collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "Event does not support tuple structs; use named fields with #[tag]",
            ))
        }
    };

    let tag_inserts = tag_fields.iter().map(|field| {
        let key = field.to_string();
        quote! { set.insert(eventline::Tag::new(#key, self.#field.to_string()).expect("tag value must be non-empty")); }
    });

    Ok(quote! {
        impl eventline::Event for #name {
            fn event_type(&self) -> &'static str {
                #event_type
            }

            fn tags(&self) -> eventline::TagSet {
                let mut set = eventline::TagSet::new();
                #(#tag_inserts)*
                set
            }
        }
    })
}
