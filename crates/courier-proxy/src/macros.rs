//! Declarative contract definitions.

/// Declare a service contract and generate its proxy.
///
/// Expands to a trait with one method per declaration, a proxy struct
/// implementing it over a [`ServiceProxy`](crate::ServiceProxy), and the
/// contract table the proxy is synthesized from.
///
/// Each method is prefixed by its return shape:
///
/// | prefix     | returns                      | execution                        |
/// |------------|------------------------------|----------------------------------|
/// | `blocking` | `Result<T>`                  | caller waits (unless `asynchronous = true`, which still waits for the value) |
/// | `future`   | `Result<CallHandle<T>>`      | already running on the worker pool |
/// | `deferred` | `Result<Deferred<T>>`        | starts when first polled         |
///
/// Doc comments go before `#[method]`. A method without `#[method]` has no
/// descriptor and fails with a configuration error when called; a contract
/// without `#[service]` fails to synthesize.
///
/// # Example
///
/// ```rust,ignore
/// use courier_proxy::service_contract;
///
/// service_contract! {
///     /// Order lookups.
///     #[service(id = "orders", version = "2.1.0", fallback = true)]
///     pub trait OrderService as OrderServiceProxy {
///         /// Fetch one order.
///         #[method(name = "getOrder", timeout_ms = 1000, retry_count = 2, params = ["orderId"])]
///         blocking fn get_order(order_id: String) -> Order;
///
///         #[method(name = "listOrders", required = ["customerId"])]
///         future fn list_orders(customer_id: String) -> Vec<Order>;
///     }
/// }
///
/// let orders = OrderServiceProxy::synthesize(transport)?;
/// let order = orders.get_order("A-17".to_string())?;
/// let all = orders.list_orders("c-1".to_string())?.await?;
/// ```
///
/// `#[service]` keys: `id`, `version`, `description`, `fallback`.
/// `#[method]` keys: `name`, `timeout_ms`, `retry_count`,
/// `retry_interval_ms`, `asynchronous`, `params`, `required`.
#[macro_export]
macro_rules! service_contract {
    // Trait signatures
    (@sig [$($doc:expr),*] blocking $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        $(#[doc = $doc])*
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$ret>;
    };
    (@sig [$($doc:expr),*] future $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        $(#[doc = $doc])*
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$crate::CallHandle<$ret>>;
    };
    (@sig [$($doc:expr),*] deferred $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        $(#[doc = $doc])*
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$crate::Deferred<$ret>>;
    };
    (@sig [$($doc:expr),*] $other:ident $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        compile_error!(concat!(
            "unknown return shape `", stringify!($other),
            "`; expected `blocking`, `future` or `deferred`"
        ));
    };

    // Proxy method bodies
    (@impl blocking $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$ret> {
            self.inner.call_blocking(
                ::core::stringify!($method),
                ::std::vec![$($crate::encode_arg(&$arg)?),*],
            )
        }
    };
    (@impl future $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$crate::CallHandle<$ret>> {
            self.inner.call_future(
                ::core::stringify!($method),
                ::std::vec![$($crate::encode_arg(&$arg)?),*],
            )
        }
    };
    (@impl deferred $method:ident ($($arg:ident : $argty:ty),*) -> $ret:ty) => {
        fn $method(&self, $($arg: $argty),*) -> $crate::Result<$crate::Deferred<$ret>> {
            self.inner.call_deferred(
                ::core::stringify!($method),
                ::std::vec![$($crate::encode_arg(&$arg)?),*],
            )
        }
    };
    (@impl $other:ident $($rest:tt)*) => {};

    // Return shapes
    (@shape blocking) => { $crate::ReturnShape::Blocking };
    (@shape future) => { $crate::ReturnShape::Future };
    (@shape deferred) => { $crate::ReturnShape::Deferred };
    (@shape $other:ident) => { $crate::ReturnShape::Blocking };

    // Service descriptor
    (@service) => { ::core::option::Option::None };
    (@service [$($key:ident = $val:expr),*]) => {{
        #[allow(unused_mut)]
        let mut service = $crate::ServiceDescriptor::new("");
        $( service = $crate::service_contract!(@service_attr service $key = $val); )*
        ::core::option::Option::Some(service)
    }};
    (@service_attr $s:ident id = $v:expr) => { $s.with_service_id($v) };
    (@service_attr $s:ident version = $v:expr) => { $s.with_version($v) };
    (@service_attr $s:ident description = $v:expr) => { $s.with_description($v) };
    (@service_attr $s:ident fallback = $v:expr) => { $s.with_fallback($v) };
    (@service_attr $s:ident $other:ident = $v:expr) => {
        compile_error!(concat!("unknown service attribute `", stringify!($other), "`"))
    };

    // Method descriptor
    (@method) => { ::core::option::Option::None };
    (@method [$($key:ident = $val:expr),*]) => {{
        #[allow(unused_mut)]
        let mut descriptor = $crate::MethodDescriptor::new();
        $( descriptor = $crate::service_contract!(@method_attr descriptor $key = $val); )*
        ::core::option::Option::Some(descriptor)
    }};
    (@method_attr $d:ident name = $v:expr) => { $d.with_name($v) };
    (@method_attr $d:ident timeout_ms = $v:expr) => { $d.with_timeout_ms($v) };
    (@method_attr $d:ident retry_count = $v:expr) => { $d.with_retry_count($v) };
    (@method_attr $d:ident retry_interval_ms = $v:expr) => { $d.with_retry_interval_ms($v) };
    (@method_attr $d:ident asynchronous = $v:expr) => { $d.with_async($v) };
    (@method_attr $d:ident params = $v:expr) => { $d.with_params($v) };
    (@method_attr $d:ident required = $v:expr) => { $d.with_required($v) };
    (@method_attr $d:ident $other:ident = $v:expr) => {
        compile_error!(concat!("unknown method attribute `", stringify!($other), "`"))
    };

    (
        $(#[doc = $doc:expr])*
        $(#[service($($skey:ident = $sval:expr),* $(,)?)])?
        $vis:vis trait $name:ident as $proxy:ident {
            $(
                $(#[doc = $mdoc:expr])*
                $(#[method $(($($mkey:ident = $mval:expr),* $(,)?))?])?
                $shape:ident fn $method:ident($($arg:ident : $argty:ty),* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(#[doc = $doc])*
        $vis trait $name: Send + Sync {
            $(
                $crate::service_contract!(
                    @sig [$($mdoc),*] $shape $method ($($arg : $argty),*) -> $ret
                );
            )*
        }

        #[doc = ::core::concat!("Synthesized proxy implementing [`", ::core::stringify!($name), "`].")]
        #[derive(Debug, Clone)]
        $vis struct $proxy {
            inner: $crate::ServiceProxy,
        }

        impl $proxy {
            /// The contract table this proxy is synthesized from.
            pub fn contract() -> $crate::ServiceContract {
                let contract = $crate::ServiceContract::new(::core::stringify!($name));
                let contract = match $crate::service_contract!(@service $([$($skey = $sval),*])?) {
                    ::core::option::Option::Some(service) => contract.with_service(service),
                    ::core::option::Option::None => contract,
                };
                contract
                $(
                    .declare(
                        ::core::stringify!($method),
                        $crate::service_contract!(@shape $shape),
                        <[&str]>::len(&[$(::core::stringify!($arg)),*]),
                        $crate::service_contract!(@method $([$($($mkey = $mval),*)?])?),
                    )
                )*
            }

            /// Synthesize a proxy bound to `transport` on the shared worker pool.
            pub fn synthesize(transport: $crate::SharedTransport) -> $crate::Result<Self> {
                $crate::synthesize(Self::contract(), transport).map(Self::from_proxy)
            }

            /// Synthesize a proxy bound to `transport` on `pool`.
            pub fn synthesize_with_pool(
                transport: $crate::SharedTransport,
                pool: ::std::sync::Arc<$crate::WorkerPool>,
            ) -> $crate::Result<Self> {
                $crate::synthesize_with_pool(Self::contract(), transport, pool).map(Self::from_proxy)
            }

            /// Wrap an already synthesized proxy.
            pub fn from_proxy(inner: $crate::ServiceProxy) -> Self {
                Self { inner }
            }

            /// Install a fallback for transient failures.
            pub fn with_fallback(
                self,
                fallback: impl $crate::Fallback + 'static,
            ) -> $crate::Result<Self> {
                self.inner.with_fallback(fallback).map(Self::from_proxy)
            }

            /// The untyped proxy.
            pub fn proxy(&self) -> &$crate::ServiceProxy {
                &self.inner
            }
        }

        impl $name for $proxy {
            $(
                $crate::service_contract!(
                    @impl $shape $method ($($arg : $argty),*) -> $ret
                );
            )*
        }
    };
}
