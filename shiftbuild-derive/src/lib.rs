use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident};

/// Implements `shiftbuild_utils::Traverse` by visiting every field in
/// declaration order. Fields marked `#[skip]` are left alone.
#[proc_macro_derive(Traverse, attributes(skip))]
pub fn derive_traverse(token_stream: TokenStream) -> TokenStream {
    let ast = match syn::parse::<DeriveInput>(token_stream) {
        Ok(ast) => ast,
        Err(e) => return e.to_compile_error().into(),
    };

    let name = &ast.ident;

    let body = match &ast.data {
        Data::Struct(data) => {
            let mut visits = vec![];
            for (idx, field) in data.fields.iter().enumerate() {
                if field.attrs.iter().any(|x| x.path.is_ident("skip")) {
                    continue;
                }

                match field.ident.as_ref() {
                    Some(ident) => visits.push(quote! {
                        ::shiftbuild_utils::Traverse::traverse(&mut self.#ident, visitor);
                    }),
                    None => {
                        let index = syn::Index::from(idx);
                        visits.push(quote! {
                            ::shiftbuild_utils::Traverse::traverse(&mut self.#index, visitor);
                        })
                    }
                }
            }

            quote! { #(#visits)* }
        }

        Data::Enum(data) => {
            let mut arms = vec![];
            for variant in &data.variants {
                let variant_name = &variant.ident;

                let arm = match &variant.fields {
                    Fields::Named(named) => {
                        let fields: Vec<Ident> = named
                            .named
                            .iter()
                            .filter_map(|x| x.ident.clone())
                            .collect();

                        quote! {
                            #name::#variant_name { #(#fields),* } => {
                                #(::shiftbuild_utils::Traverse::traverse(#fields, visitor);)*
                            }
                        }
                    }

                    Fields::Unnamed(unnamed) => {
                        let fields: Vec<Ident> = (0..unnamed.unnamed.len())
                            .map(|idx| {
                                Ident::new(&format!("f{}", idx), proc_macro2::Span::call_site())
                            })
                            .collect();

                        quote! {
                            #name::#variant_name(#(#fields),*) => {
                                #(::shiftbuild_utils::Traverse::traverse(#fields, visitor);)*
                            }
                        }
                    }

                    Fields::Unit => quote! {
                        #name::#variant_name => {}
                    },
                };

                arms.push(arm);
            }

            quote! {
                match self {
                    #(#arms),*
                }
            }
        }

        Data::Union(_) => {
            return syn::Error::new_spanned(&ast.ident, "Traverse cannot be derived for unions")
                .to_compile_error()
                .into();
        }
    };

    let expanded = quote! {
        impl ::shiftbuild_utils::Traverse for #name {
            #[allow(unused_variables)]
            fn traverse<V: ::shiftbuild_utils::Visitor>(&mut self, visitor: &mut V) {
                #body
            }
        }
    };

    expanded.into()
}
