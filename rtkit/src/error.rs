/// Error types for the rtkit crate.  The tokenizer core has precise error variants; at this
/// level errors are mostly reported to a human, so anyhow with context is enough.
pub type Result<T> = anyhow::Result<T>;
