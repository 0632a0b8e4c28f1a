//! Session dispatch macro for reducing code duplication.
//!
//! Direct and pooled MySQL sessions share one code path, so the `sqlx`
//! backend borrows every session as a [`SessionRef`](crate::db::sqlx_backend::SessionRef)
//! and dispatches on that. The macro expands at compile time with zero
//! runtime overhead.

/// Macro for generating session dispatch match arms.
///
/// # Example
///
/// ```ignore
/// dispatch_session!(session.borrow_mut(), {
///     MySql(c) => do_mysql(c).await?,
///     Sqlite(c) => do_sqlite(c).await?,
/// });
/// ```
#[macro_export]
macro_rules! dispatch_session {
    ($session:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $session {
            $(
                $crate::db::sqlx_backend::SessionRef::$variant($c) => $body,
            )+
        }
    };
}

pub use dispatch_session;
