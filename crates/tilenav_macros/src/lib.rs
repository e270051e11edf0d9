use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Pat, Type};

/// Time a function or method when the `perf_stats` feature is enabled.
///
/// The body is wrapped with a drop guard that logs the elapsed time through
/// `bevy::prelude::info!` when the function returns by any path. Without the
/// `perf_stats` feature the guard is compiled out entirely.
///
/// # Tick sampling
/// If the function takes a parameter named `tick` of a primitive integer
/// type (the navigation tick counter), the guard also logs every 100th tick
/// regardless of duration, so steady-state cost shows up in the log.
///
/// # Example
/// ```ignore
/// #[profile]
/// fn run_tick(&mut self, tick: u64) {
///     // ... work ...
/// }
///
/// #[profile(2)] // threshold in milliseconds
/// pub fn find_paths_batch(&self, requests: &[PathRequest]) { ... }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        attr.to_string().parse().unwrap_or(1)
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let has_tick_param = sig.inputs.iter().any(|arg| {
        let FnArg::Typed(pat_type) = arg else {
            return false;
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return false;
        };
        if pat_ident.ident != "tick" {
            return false;
        }
        match &*pat_type.ty {
            Type::Path(type_path) => type_path
                .path
                .get_ident()
                .map(|ident| {
                    matches!(
                        ident.to_string().as_str(),
                        "u16" | "u32" | "u64" | "usize"
                    )
                })
                .unwrap_or(false),
            _ => false,
        }
    });

    let profile_guard_def = if has_tick_param {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
                tick_value: u64,
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms || (self.tick_value % 100 == 0) {
                        bevy::prelude::info!("[PERF] {} (tick {}): {:?}", self.name, self.tick_value, elapsed);
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
                tick_value: tick as u64,
            }
        }
    } else {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms {
                        bevy::prelude::info!("[PERF] {}: {:?}", self.name, elapsed);
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
            }
        }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_timer = {
                #profile_guard_def
            };

            #block
        }
    };

    output.into()
}
