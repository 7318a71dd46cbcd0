use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{Ident, ItemFn, LitStr};

/// Proc macro to denote a Transaction
///
/// The function must be `async` and return a `Result<T, E>` where `T` implements
/// `loadpulse::TransactionOutcome`. Every call is timed, counted as a request, and counted as a
/// failed request when the outcome says so.
///
/// # Example
/// ```ignore
/// use loadpulse::prelude::*;
///
/// #[transaction]
/// async fn fetch(client: &reqwest::Client, url: &str) -> Result<(), reqwest::Error> {
///     client.get(url).send().await?;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn transaction(attr: TokenStream, item: TokenStream) -> TokenStream {
    transaction_internal(attr, item).into()
}

fn transaction_internal(_attr: TokenStream, item: TokenStream) -> TokenStream2 {
    let input = match syn::parse::<ItemFn>(item) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(sig.fn_token, "#[transaction] requires an async fn")
            .to_compile_error();
    }

    let stmts = &block.stmts;
    let name = sig.ident.to_string();
    let success = LitStr::new(&format!("{name}_success"), Span::call_site());
    let error = LitStr::new(&format!("{name}_error"), Span::call_site());
    let latency = LitStr::new(&format!("{name}_latency"), Span::call_site());

    quote! {
        #(#attrs)* #vis #sig {
            let labels = ::loadpulse::core::TransactionLabels {
                success: #success,
                error: #error,
                latency: #latency,
            };
            ::loadpulse::transaction::transaction_hook(labels, async move {
                #(#stmts)*
            }).await
        }
    }
}

/// Proc macro to denote a Scenario
///
/// NOTE: Only works on `async` functions which take no arguments and return nothing. The body is
/// one iteration; each virtual user calls it in a loop.
///
/// See the `Scenario` struct for more information on the methods this macro provides on functions.
///
/// # Example
/// ```ignore
/// use loadpulse::prelude::*;
///
/// #[scenario]
/// async fn my_scenario() {
/// }
///
/// # async fn run() {
/// let stats = my_scenario()
///     .vus(20)
///     .duration(std::time::Duration::from_secs(30))
///     .await;
/// # }
/// ```
#[proc_macro_attribute]
pub fn scenario(attr: TokenStream, item: TokenStream) -> TokenStream {
    scenario_internal(attr, item).into()
}

fn scenario_internal(_attr: TokenStream, item: TokenStream) -> TokenStream2 {
    let input = match syn::parse::<ItemFn>(item) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() || !sig.inputs.is_empty() {
        return syn::Error::new_spanned(
            sig.fn_token,
            "#[scenario] requires an async fn without arguments",
        )
        .to_compile_error();
    }

    let stmts = &block.stmts;

    let new_name = Ident::new(&format!("__loadpulse_{}", sig.ident), Span::call_site());
    let mut new_sig = sig.clone();
    new_sig.ident = new_name.clone();

    let mut scen_sig = sig.clone();
    let scen_name = sig.ident.clone();
    scen_sig.asyncness = None;
    scen_sig.output = syn::parse_quote! {
        -> impl ::loadpulse::scenario::ConfigurableScenario
    };

    quote! {
        #(#attrs)* #vis #scen_sig {
            ::loadpulse::scenario::Scenario::new(stringify!(#scen_name), #new_name)
        }

        #[doc(hidden)]
        #(#attrs)* #vis #new_sig {
            #(#stmts)*
        }
    }
}
