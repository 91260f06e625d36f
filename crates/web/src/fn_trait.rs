use std::future::Future;

/// Represents an async function taking its arguments as one tuple.
pub trait FnTrait<Args>: Send + Sync {
    type Output;

    fn call(&self, args: Args) -> impl Future<Output = Self::Output> + Send;
}

/// impl `FnTrait` for `Fn`, from 0 parameters to 6 parameters
///
/// for example, `Fn(A, B)` expands to:
///```ignore
/// impl<Func, Fut, A, B> FnTrait<(A, B)> for Func
/// where
///     Func: Fn(A, B) -> Fut + Send + Sync,
///     Fut: Future + Send,
/// {
///     type Output = Fut::Output;
///
///     fn call(&self, (A, B): (A, B)) -> impl Future<Output = Self::Output> + Send {
///         (self)(A, B)
///     }
/// }
///```
macro_rules! impl_fn_trait_for_fn ({ $($param:ident)* } => {
    impl<Func, Fut, $($param,)*> FnTrait<($($param,)*)> for Func
    where
        Func: Fn($($param),*) -> Fut + Send + Sync,
        Fut: Future + Send,
    {
        type Output = Fut::Output;

        #[inline]
        #[allow(non_snake_case, reason = "tuple fields reuse the type parameter names")]
        fn call(&self, ($($param,)*): ($($param,)*)) -> impl Future<Output = Self::Output> + Send {
            (self)($($param,)*)
        }
    }
});

impl_fn_trait_for_fn! {}
impl_fn_trait_for_fn! { A }
impl_fn_trait_for_fn! { A B }
impl_fn_trait_for_fn! { A B C }
impl_fn_trait_for_fn! { A B C D }
impl_fn_trait_for_fn! { A B C D E }
impl_fn_trait_for_fn! { A B C D E F }

#[cfg(test)]
mod tests {
    use super::FnTrait;
    use bytes::Bytes;
    use duet_http::request_id::RequestId;
    use http::{HeaderMap, Method};

    fn assert_is_fn_trait<Args, F: FnTrait<Args>>(_f: F) {
        //noop
    }
    async fn foo0() {}
    async fn foo1(_a: Method) {}
    async fn foo2(_a1: Method, _a2: HeaderMap) {}
    async fn foo3(_a1: Method, _a2: HeaderMap, _a3: RequestId) {}
    async fn foo4(_a1: Method, _a2: HeaderMap, _a3: RequestId, _a4: Bytes) {}
    async fn foo5(_a1: (), _a2: HeaderMap, _a3: (), _a4: (), _a5: String) {}
    async fn foo6(_a1: (), _a2: HeaderMap, _a3: (), _a4: (), _a5: (), _a6: Option<String>) {}

    #[test]
    fn async_fns_are_fn_traits() {
        assert_is_fn_trait(foo0);
        assert_is_fn_trait(foo1);
        assert_is_fn_trait(foo2);
        assert_is_fn_trait(foo3);
        assert_is_fn_trait(foo4);
        assert_is_fn_trait(foo5);
        assert_is_fn_trait(foo6);
    }

    #[tokio::test]
    async fn call_spreads_the_tuple() {
        let add = |a: u32, b: u32| async move { a + b };
        assert_eq!(add.call((2, 3)).await, 5);
    }
}
