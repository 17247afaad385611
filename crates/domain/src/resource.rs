//! State published by a resource synchronization controller.

/// Loaded data, either a single object or a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData<T> {
    Item(T),
    List(Vec<T>),
}

impl<T> ResourceData<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(items) if items.is_empty())
    }

    #[must_use]
    pub fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[T]> {
        match self {
            Self::List(items) => Some(items),
            Self::Item(_) => None,
        }
    }
}

/// Whether anything has been fetched yet, and whether it was empty.
///
/// An empty collection after a successful fetch is `Empty`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    NotYetFetched,
    Empty,
    Populated,
}

/// `{data, loading, error}` triple owned by exactly one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<ResourceData<T>>,
    pub loading: bool,
    /// User-facing message; raw transport errors are never stored here.
    pub error: Option<String>,
    pub fetched: bool,
}

impl<T> ResourceState<T> {
    #[must_use]
    pub fn new(loading: bool) -> Self {
        Self { data: None, loading, error: None, fetched: false }
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        if !self.fetched {
            return FetchStatus::NotYetFetched;
        }
        match &self.data {
            Some(data) if !data.is_empty() => FetchStatus::Populated,
            _ => FetchStatus::Empty,
        }
    }
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self::new(false)
    }
}
