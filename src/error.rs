//! Error types for both backends.

/// Errors surfaced by renderer construction and drawing.
///
/// Construction-time errors (context acquisition, shader compilation)
/// propagate to the caller. Per-draw errors indicate a broken invariant
/// rather than a transient condition, so there are no retries. Degenerate
/// geometry and missing costumes are silent skips, not errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No usable GPU adapter, device or raster surface. The underlying
    /// platform error message is carried verbatim.
    #[error("failed to acquire a rendering context: {0}")]
    ContextAcquisition(String),

    /// A shader failed validation or compilation.
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompile {
        label: &'static str,
        message: String,
    },

    /// A texture, buffer or pixmap could not be allocated.
    #[error("failed to allocate {0}")]
    Allocation(&'static str),

    /// A shader variant was requested with a feature flag the fragment
    /// source does not define.
    #[error("unknown shader feature flag `{0}`")]
    UnknownShaderFlag(String),

    /// A uniform was addressed in a variant that does not carry it. This is
    /// a programming error, not a runtime condition.
    #[error("uniform `{uniform}` is not referenced by shader variant `{variant}`")]
    UniformLookup {
        uniform: &'static str,
        variant: String,
    },

    /// Mapping a readback buffer failed or produced too little data.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}
