//! Dispatch shims
//!
//! Two layers are generated from the registry:
//!
//! - one `unsafe` method per entry point on [`Binding`], which loads on first
//!   use and then either forwards to the resolved symbol or returns the
//!   entry's failure value;
//! - with the `export-symbols` feature, one `extern "C"` function per entry
//!   point carrying the exact expat name and signature, forwarding to the
//!   process-wide binding. A C consumer links against these instead of
//!   libexpat.
//!
//! Arguments and results pass through untouched. Shims never log, never
//! validate and never retry.

#![allow(non_snake_case, clippy::unused_unit)]

use std::ptr::{null, null_mut};

use crate::loader::Binding;
use crate::registry::for_each_expat_function;
use crate::types::*;

macro_rules! declare_dispatch {
    ($(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty = $fail:expr;
    )*) => {
        impl Binding {
            $(
                $(#[$meta])*
                ///
                #[doc = concat!("Forwards to `", stringify!($name), "`, or returns `",
                    stringify!($fail), "` when it cannot be resolved.")]
                ///
                /// # Safety
                ///
                /// Same contract as the expat function of the same name.
                #[inline]
                pub unsafe fn $name(&self, $($arg: $ty),*) -> $ret {
                    match self.symbols().and_then(|symbols| symbols.$name) {
                        Some(f) => unsafe { f($($arg),*) },
                        None => $fail,
                    }
                }
            )*
        }

        #[cfg(feature = "export-symbols")]
        pub mod exports {
            //! C entry points bound to [`global`](crate::global)

            use super::*;

            $(
                $(#[$meta])*
                ///
                /// # Safety
                ///
                /// Same contract as the expat function of the same name.
                #[unsafe(no_mangle)]
                pub unsafe extern "C" fn $name($($arg: $ty),*) -> $ret {
                    unsafe { crate::loader::global().$name($($arg),*) }
                }
            )*
        }
    };
}

for_each_expat_function!(declare_dispatch);
