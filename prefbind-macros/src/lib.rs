use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, ImplItem, ImplItemFn, ItemImpl, Stmt,
    Variant, Visibility,
};

/// Procedural macro that turns an enum into a prefbind error type
///
/// This macro automatically:
/// 1. Adds `#[derive(Debug, thiserror::Error, uniffi::Error)]` and `#[uniffi(flat_error)]`
/// 2. Adds a `Generic { message: String }` variant if not already present
/// 3. Implements `From<anyhow::Error>` for the error type, keeping the cause chain
/// 4. Provides helper methods for converting `anyhow` results
///
/// # Usage
///
/// ```rust,ignore
/// #[prefbind_error]
/// pub enum CloudProviderError {
///     #[error("setup rejected: {reason}")]
///     SetupRejected { reason: String },
/// }
/// ```
#[proc_macro_attribute]
pub fn prefbind_error(_args: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(
            &input,
            "prefbind_error can only be applied to enums",
        )
        .to_compile_error()
        .into();
    };

    let enum_name = &input.ident;
    let visibility = &input.vis;
    let generics = &input.generics;

    // Existing derive/uniffi attributes are replaced by ours
    let attrs: Vec<_> = input
        .attrs
        .iter()
        .filter(|attr| {
            !attr.path().is_ident("derive") && !attr.path().is_ident("uniffi")
        })
        .collect();

    let mut variants = data_enum.variants.clone();
    if !variants.iter().any(|variant| variant.ident == "Generic") {
        let generic_variant: Variant = syn::parse_quote! {
            /// A generic error that can wrap any anyhow error.
            #[error("Generic error: {message}")]
            Generic {
                /// The error message from the wrapped error.
                message: String
            }
        };
        variants.push(generic_variant);
    }

    let expanded = quote! {
        #[derive(Debug, thiserror::Error, uniffi::Error)]
        #[uniffi(flat_error)]
        #(#attrs)*
        #visibility enum #enum_name #generics {
            #variants
        }

        impl #generics From<anyhow::Error> for #enum_name #generics {
            fn from(err: anyhow::Error) -> Self {
                Self::Generic {
                    message: {
                        let mut message = err.to_string();
                        let chain: Vec<String> = err.chain().skip(1).map(|e| e.to_string()).collect();
                        if !chain.is_empty() {
                            message.push_str(" (caused by: ");
                            message.push_str(&chain.join(" -> "));
                            message.push(')');
                        }
                        message
                    }
                }
            }
        }

        impl #generics #enum_name #generics {
            /// Convert an anyhow::Result to a Result with this error type
            pub fn from_anyhow_result<T>(result: anyhow::Result<T>) -> Result<T, Self> {
                result.map_err(Self::from)
            }

            /// Convert an anyhow::Result to a Result with this error type, adding a prefix
            pub fn from_anyhow_result_with_prefix<T>(
                result: anyhow::Result<T>,
                prefix: &str
            ) -> Result<T, Self> {
                result.map_err(|err| match Self::from(err) {
                    Self::Generic { message } => Self::Generic {
                        message: format!("{}: {}", prefix, message),
                    },
                    other => other,
                })
            }
        }
    };

    TokenStream::from(expanded)
}

/// Procedural macro that wraps `uniffi::export` and injects a logging context
///
/// This macro automatically:
/// 1. Forwards the attribute to `#[uniffi::export]`
/// 2. Injects `let _prefbind_logger_ctx = crate::primitives::logger::LogContext::new("TypeName");`
///    at the start of every `pub fn`
/// 3. Adds `async_runtime = "tokio"` if any public method is async
///
/// # Usage
///
/// ```rust,ignore
/// #[prefbind_export]
/// impl PreferencesApp {
///     pub fn unique_id(&self) -> String {
///         // log lines here are prefixed with [PreferencesApp]
///         self.resolve_unique_id()
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn prefbind_export(args: TokenStream, input: TokenStream) -> TokenStream {
    let input_impl = parse_macro_input!(input as ItemImpl);

    let type_name = match &*input_impl.self_ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map_or_else(|| "Unknown".to_string(), |segment| segment.ident.to_string()),
        _ => "Unknown".to_string(),
    };

    let has_async_functions = has_async_functions_in_impl(&input_impl.items);

    let new_items = input_impl
        .items
        .iter()
        .map(|item| match item {
            ImplItem::Fn(method) if matches!(method.vis, Visibility::Public(_)) => {
                let mut new_method = method.clone();
                inject_logging_context(&mut new_method, &type_name);
                ImplItem::Fn(new_method)
            }
            _ => item.clone(),
        })
        .collect();

    let new_impl = ItemImpl {
        items: new_items,
        ..input_impl
    };

    let mut args = proc_macro2::TokenStream::from(args);
    if has_async_functions {
        args = if args.is_empty() {
            quote! { async_runtime = "tokio" }
        } else {
            quote! { #args, async_runtime = "tokio" }
        };
    }

    quote! {
        #[uniffi::export(#args)]
        #new_impl
    }
    .into()
}

/// Check if any public functions in the impl items are async
fn has_async_functions_in_impl(impl_items: &[ImplItem]) -> bool {
    impl_items.iter().any(|item| {
        if let ImplItem::Fn(method) = item {
            matches!(method.vis, Visibility::Public(_))
                && method.sig.asyncness.is_some()
        } else {
            false
        }
    })
}

/// Inject logging context at the start of a function body
fn inject_logging_context(method: &mut ImplItemFn, type_name: &str) {
    let context_stmt: Stmt = syn::parse_quote! {
        let _prefbind_logger_ctx = crate::primitives::logger::LogContext::new(#type_name);
    };
    method.block.stmts.insert(0, context_stmt);
}
