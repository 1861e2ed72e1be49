//! Collision policy for container operations that can encounter a key
//! already present in the target.

/// How a container operation should handle a key collision.
///
/// Used by [`crate::ops::unite`]/[`crate::ops::overwrite`] and by
/// [`crate::container::VariantSet`] insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Reject the operation and raise an error.
    Complain,
    /// Replace the existing value with the new one.
    Overwrite,
    /// Keep the existing value; silently drop the new one.
    Ignore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_distinct() {
        assert_ne!(CollisionPolicy::Complain, CollisionPolicy::Overwrite);
        assert_ne!(CollisionPolicy::Overwrite, CollisionPolicy::Ignore);
    }
}
