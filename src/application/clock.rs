use time::Date;

/// Source of "today" for request canonicalization.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}
