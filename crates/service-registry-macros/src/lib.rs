use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Expr, Token};

struct ServiceRegistrationArgs {
    name: Expr,
    listen: Expr,
    registry: Option<Expr>,
}

impl Parse for ServiceRegistrationArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let args = Punctuated::<Expr, Token![,]>::parse_terminated(input)?;
        let span = input.span();
        let mut args = args.into_iter();

        match (args.next(), args.next(), args.next(), args.next()) {
            (Some(name), Some(listen), registry, None) => Ok(ServiceRegistrationArgs {
                name,
                listen,
                registry,
            }),
            _ => Err(syn::Error::new(
                span,
                "expected register_service!(name, \"host:port\") or register_service!(name, \"host:port\", registry_url)",
            )),
        }
    }
}

/// Macro to register the current process with Consul
///
/// With two arguments the registry address comes from `CONSUL_RUL`.
///
/// # Example
/// ```ignore
/// use service_registry::register_service;
///
/// #[tokio::main]
/// async fn main() {
///     let discovery = register_service!("miner", "10.0.0.5:9090").await.unwrap();
///     let discovery = register_service!("miner", "10.0.0.5:9090", "http://consul:8500").await.unwrap();
/// }
/// ```
#[proc_macro]
pub fn register_service(input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(input as ServiceRegistrationArgs);

    let name = args.name;
    let listen = args.listen;

    let expanded = match args.registry {
        Some(registry) => quote! {
            service_registry::init_consul(
                ::core::convert::AsRef::<str>::as_ref(&#registry),
                ::core::convert::AsRef::<str>::as_ref(&#name),
                ::core::convert::AsRef::<str>::as_ref(&#listen),
            )
        },
        None => quote! {
            service_registry::bootstrap_service(
                ::core::convert::AsRef::<str>::as_ref(&#name),
                ::core::convert::AsRef::<str>::as_ref(&#listen),
            )
        },
    };

    TokenStream::from(expanded)
}
