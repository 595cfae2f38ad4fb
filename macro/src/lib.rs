use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Drives `async fn main` on a stardos event loop.
///
/// The generated `main` returns only after the body has finished and every
/// detached task spawned from it has settled, so a program may spawn work
/// and fall off the end of `main` without losing it.
#[proc_macro_attribute]
pub fn attr_macro_main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return quote_spanned! { input.sig.fn_token.span()=>
            compile_error!("#[stardos::main] needs an `async fn`");
        }
        .into();
    }

    if input.sig.ident != "main" {
        return quote_spanned! { input.sig.ident.span()=>
            compile_error!("#[stardos::main] only applies to the program's `main`");
        }
        .into();
    }

    if !input.sig.inputs.is_empty() {
        return quote_spanned! { input.sig.inputs.span()=>
            compile_error!("the event loop entry point takes no arguments");
        }
        .into();
    }
    let ItemFn {
        attrs, sig, block, ..
    } = input;
    let output = sig.output;
    quote! {
        pub fn main() #output {
            #(#attrs)*
            async fn __stardos_main() #output #block

            ::stardos::runtime::block_on(__stardos_main())
        }
    }
    .into()
}

/// Runs an `async fn` test body on a fresh stardos event loop.
///
/// Each test gets its own loop, which also waits for the tasks the test
/// spawned. Other attributes on the function, such as `#[should_panic]`, are
/// kept.
#[proc_macro_attribute]
pub fn attr_macro_test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return quote_spanned! { input.sig.fn_token.span()=>
            compile_error!("#[stardos::test] needs an `async fn`");
        }
        .into();
    }

    let name = input.sig.ident.clone();

    if !input.sig.inputs.is_empty() {
        return quote_spanned! { input.sig.inputs.span()=>
            compile_error!("event loop tests take no arguments");
        }
        .into();
    }
    let ItemFn {
        attrs, sig, block, ..
    } = input;
    let output = sig.output;
    quote! {
        #[test]
        #(#attrs)*
        pub fn #name() #output {
            async fn __stardos_test() #output #block

            ::stardos::runtime::block_on(__stardos_test())
        }
    }
    .into()
}
