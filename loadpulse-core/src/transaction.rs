/// Classifies the result of a transaction as a failed request or not.
///
/// `Err` always counts as a failure. For `Ok` values the wrapped type decides, which lets an HTTP
/// status outside of the 2xx/3xx range count as a failed request while the caller still gets to
/// inspect it.
pub trait TransactionOutcome {
    fn is_failure(&self) -> bool;
}

impl TransactionOutcome for () {
    fn is_failure(&self) -> bool {
        false
    }
}

impl<T: TransactionOutcome, E> TransactionOutcome for Result<T, E> {
    fn is_failure(&self) -> bool {
        match self {
            Ok(value) => value.is_failure(),
            Err(_) => true,
        }
    }
}
