use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse::Parser, punctuated::Punctuated, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature,
    Token, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the test's data directory is removed regardless of how the
/// test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::store::Store`], both backed by the same freshly created store.
///
/// Arguments:
/// - `sqlite`: use the SQLite backend instead of JSON files.
/// - `empty`: do not seed the default questions.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = syn::parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    let (storage, seed) = match parse_args(args) {
        Ok(options) => options,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(
                data_dir: &std::path::Path,
            ) -> (rocket::local::asynchronous::Client, crate::store::Store) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["poll_backend"],
                    None,
                    None,
                );

                let figment = rocket::Config::figment()
                    .merge(("storage", #storage))
                    .merge(("data_dir", data_dir))
                    .merge(("seed_questions", #seed));
                let rocket_client =
                    rocket::local::asynchronous::Client::tracked(crate::rocket_for_figment(figment))
                        .await
                        .unwrap();
                let store = rocket_client
                    .rocket()
                    .state::<crate::store::Store>()
                    .cloned()
                    .unwrap();

                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            fn cleanup(data_dir: &std::path::Path) {
                let _ = std::fs::remove_dir_all(data_dir);
            }

            let data_dir = std::env::temp_dir().join(format!(
                "poll-test-{}-{:08x}",
                stringify!(#name),
                rand::random::<u32>()
            ));

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, store) = outer_runtime.block_on(setup(&data_dir));

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let store_mutex = std::sync::Mutex::new(store);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let store = store_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            cleanup(&data_dir);
            drop(outer_runtime);

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Parse the attribute arguments into the storage kind and whether to seed.
fn parse_args(args: TokenStream) -> Result<(&'static str, bool), syn::Error> {
    let args = Punctuated::<Ident, Token![,]>::parse_terminated.parse(args)?;

    let mut storage = "json";
    let mut seed = true;
    for arg in args {
        if arg == "sqlite" {
            storage = "sqlite";
        } else if arg == "empty" {
            seed = false;
        } else {
            return Err(syn::Error::new(
                arg.span(),
                "Expected `sqlite` and/or `empty`",
            ));
        }
    }

    Ok((storage, seed))
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(last) = type_path.path.segments.last() {
                    if last.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if last.ident == "Store" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Store`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: Store`",
        ));
    }

    Ok(args)
}
