use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Where the server under test keeps its data.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Backing {
    Memory,
    Mongodb,
}

/// Transform an asynchronous route test into a synchronous one, running it
/// against a fresh server.
///
/// By default the server is backed by its own in-memory store. With
/// `#[backend_test(mongodb)]` it is backed by a fresh database on the configured
/// `db_uri`, which is dropped regardless of how the test terminates. MongoDB
/// tests are ignored unless requested, since they need a replica set.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::engine::Engine`], plus [`crate::store::MemoryStore`] in memory mode,
/// or [`crate::store::MongoStore`] and [`mongodb::Database`] in MongoDB mode.
/// All of them share the same state.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let backing = match parse_macro_input!(args as Option<Ident>) {
        None => Backing::Memory,
        Some(arg) if arg == "mongodb" => Backing::Mongodb,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the injected parameters and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), backing) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    match backing {
        Backing::Memory => memory_test(name, new_name, item_fn, test_args),
        Backing::Mongodb => mongodb_test(name, new_name, item_fn, test_args),
    }
    .into()
}

fn memory_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    test_args: Vec<TokenStream2>,
) -> TokenStream2 {
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::store::MemoryStore) {
                crate::init_test_logging();
                let store = crate::store::MemoryStore::new();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(store.clone()),
                )
                .await
                .unwrap();
                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, store) = runtime.block_on(setup());
            let engine = rocket_client
                .rocket()
                .state::<crate::engine::Engine>()
                .unwrap()
                .clone();
            // Not every test asks for every dependency.
            let _ = (&store, &engine);

            runtime.block_on(#new_name(#(#test_args),*));
        }
    }
}

fn mongodb_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    test_args: Vec<TokenStream2>,
) -> TokenStream2 {
    quote! {
        #[test]
        #[ignore = "needs a MongoDB replica set at `db_uri`"]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::store::MongoStore,
                mongodb::Database,
            ) {
                crate::init_test_logging();
                let (store, db) = crate::mongo_store().await;
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(store.clone()),
                )
                .await
                .unwrap();
                (rocket_client, store, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

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
            let (rocket_client, store, db) = outer_runtime.block_on(setup());
            let engine = rocket_client
                .rocket()
                .state::<crate::engine::Engine>()
                .unwrap()
                .clone();

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let state_mutex = std::sync::Mutex::new((rocket_client, store, engine, db.clone()));
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let (rocket_client, store, engine, db) = state_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();
                // Not every test asks for every dependency.
                let _ = (&store, &engine, &db);

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, backing: Backing) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injected = vec![];
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last segment names the type whatever path it was written with.
                if let Some(segment) = type_path.path.segments.last() {
                    let arg = match (segment.ident.to_string().as_str(), backing) {
                        ("Client", _) => Some(quote! { rocket_client }),
                        ("Engine", _) => Some(quote! { engine.clone() }),
                        ("MemoryStore", Backing::Memory) => Some(quote! { store.clone() }),
                        ("MongoStore", Backing::Mongodb) => Some(quote! { store.clone() }),
                        ("Database", Backing::Mongodb) => Some(quote! { db.clone() }),
                        _ => None,
                    };
                    if let Some(arg) = arg {
                        let ty = segment.ident.to_string();
                        if injected.contains(&ty) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{ty}`"),
                            ));
                        }
                        injected.push(ty);
                        args.push(arg);
                        continue;
                    }
                }
            }
        }

        let expected = match backing {
            Backing::Memory => {
                "Expected one of `client_ident: Client`, `engine_ident: Engine` or `store_ident: MemoryStore`"
            }
            Backing::Mongodb => {
                "Expected one of `client_ident: Client`, `engine_ident: Engine`, `store_ident: MongoStore` or `db_ident: Database`"
            }
        };
        return Err(syn::Error::new(input.span(), expected));
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(source: &str) -> Signature {
        syn::parse_str::<ItemFn>(source).unwrap().sig
    }

    #[test]
    fn injects_by_backing() {
        let memory = check_sig(sig("async fn t(c: Client, s: MemoryStore) {}"), Backing::Memory);
        assert_eq!(memory.unwrap().len(), 2);
        let mongodb = check_sig(
            sig("async fn t(e: Engine, s: MongoStore, db: Database) {}"),
            Backing::Mongodb,
        );
        assert_eq!(mongodb.unwrap().len(), 3);
        assert!(check_sig(sig("async fn t(s: MongoStore) {}"), Backing::Memory).is_err());
        assert!(check_sig(sig("async fn t(s: MemoryStore) {}"), Backing::Mongodb).is_err());
    }

    #[test]
    fn rejects_sync_and_repeated_parameters() {
        assert!(check_sig(sig("fn t(c: Client) {}"), Backing::Memory).is_err());
        assert!(check_sig(sig("async fn t(a: Client, b: Client) {}"), Backing::Memory).is_err());
    }
}
