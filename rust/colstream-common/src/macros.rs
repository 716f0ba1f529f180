/// Unwraps a `Result` inside a function returning `Option<Result<T, E>>`.
///
/// On `Err(e)` the enclosing function returns `Some(Err(e))`. Used by
/// `Iterator<Item = Result<T>>` implementations, such as frame iterators, that
/// call fallible helpers from `next()`.
#[macro_export]
macro_rules! try_or_ret_some_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Some(Err(err));
            }
        }
    };
}
