/// Types that can produce an inert instance of themselves.
///
/// A toggled factory whose flag is off and which has no fallback builds its
/// instances through this. Trait objects usually get it from
/// [`toggle_stub!`](crate::toggle_stub); concrete types can implement it by
/// hand.
pub trait Stub {
    fn stub() -> Box<Self>;
}

/// Declares a no-op implementation of a capability trait and registers it as
/// the [`Stub`](crate::stub::Stub) for `dyn Trait`.
///
/// Every listed method accepts any arguments and has no side effects. A method
/// declared as `fn name(..) -> T;` returns `Default::default()`, so `T` must
/// implement `Default`. Outputs without one, such as `Result`, name their inert
/// value after `=>`. `async fn`s return an already completed future. The trait
/// must be declared with `#[async_trait]` whenever it has async methods, and
/// methods take `&self` with named arguments.
///
/// ```ignore
/// toggle_stub! {
///     pub struct MailerStub: Mailer {
///         fn name(&self) -> String;
///         async fn flush(&self) -> Option<u32>;
///         async fn send(&self, to: &str) -> Result<(), MailError> => Ok(());
///     }
/// }
/// ```
#[macro_export]
macro_rules! toggle_stub {
    (@methods $stub:ident, $cap:ident, [$($done:tt)*]) => {
        #[allow(unused_variables)]
        #[$crate::__private::async_trait]
        impl $cap for $stub {
            $($done)*
        }
    };
    (@methods $stub:ident, $cap:ident, [$($done:tt)*]
        async fn $name:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)? => $body:expr;
        $($rest:tt)*
    ) => {
        $crate::toggle_stub!(@methods $stub, $cap, [
            $($done)*
            async fn $name(&self $(, $arg: $ty)*) $(-> $ret)? {
                $body
            }
        ] $($rest)*);
    };
    (@methods $stub:ident, $cap:ident, [$($done:tt)*]
        fn $name:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)? => $body:expr;
        $($rest:tt)*
    ) => {
        $crate::toggle_stub!(@methods $stub, $cap, [
            $($done)*
            fn $name(&self $(, $arg: $ty)*) $(-> $ret)? {
                $body
            }
        ] $($rest)*);
    };
    (@methods $stub:ident, $cap:ident, [$($done:tt)*]
        async fn $name:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?;
        $($rest:tt)*
    ) => {
        $crate::toggle_stub!(@methods $stub, $cap, [$($done)*]
            async fn $name(&self $(, $arg: $ty)*) $(-> $ret)?
                => ::core::default::Default::default();
            $($rest)*);
    };
    (@methods $stub:ident, $cap:ident, [$($done:tt)*]
        fn $name:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?;
        $($rest:tt)*
    ) => {
        $crate::toggle_stub!(@methods $stub, $cap, [$($done)*]
            fn $name(&self $(, $arg: $ty)*) $(-> $ret)?
                => ::core::default::Default::default();
            $($rest)*);
    };
    ($(#[$meta:meta])* $vis:vis struct $stub:ident : $cap:ident { $($body:tt)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $stub;

        $crate::toggle_stub!(@methods $stub, $cap, [] $($body)*);

        impl $crate::stub::Stub for dyn $cap {
            fn stub() -> ::std::boxed::Box<Self> {
                ::std::boxed::Box::new($stub)
            }
        }
    };
}
