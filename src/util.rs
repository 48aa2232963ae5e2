// Debug tracing: a no-op in release builds, a line per dispatched
// instruction under `cargo test`.
#[macro_export]
macro_rules! trace(
    ( $($thing:expr),* ) => { if cfg!(test) { println! { $($thing),* } } };
);
