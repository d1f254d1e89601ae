//! Model trait implemented by every resource type.

/// A resource type that repositories can serve.
///
/// `NAME` identifies the resource in logs and errors. Identifiers are
/// strings; a model that has not been persisted yet has no id.
pub trait Model: Send + Sync + 'static {
    /// Resource name, e.g. `"book"`.
    const NAME: &'static str;

    /// The identifier of this instance, if it has one.
    fn id(&self) -> Option<&str>;

    /// Assign an identifier (used by repositories on create).
    fn set_id(&mut self, id: String);
}
