//! Per-image load parameters and the reconciliation policy
//!
//! Two requests for the same image name may disagree on quality settings.
//! `reconcile` decides, as a pure function, what the shared entry ends up
//! with and whether its content must be reloaded from source.

/// Texture filtering requested for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Default,
    Linear,
    Nearest,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureRepeat {
    #[default]
    Repeat,
    Clamp,
    ClampToBorder,
}

/// Quality depth of an image; higher variants always win reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TextureDepth {
    Low,
    #[default]
    Default,
    High,
}

/// Cube map topology of an image
///
/// A hard partition: the same name requested with two different kinds is a
/// configuration bug upstream, not something reconciliation may paper over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CubeKind {
    /// Ordinary 2D image
    #[default]
    None,
    /// Six native cube faces
    Native,
    /// Six camera-oriented faces
    Camera,
}

/// Load parameters carried by every image request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageParams {
    pub filter: TextureFilter,
    pub repeat: TextureRepeat,
    pub depth: TextureDepth,
    pub cube: CubeKind,
    pub allow_downsize: bool,
}

/// Outcome of reconciling a new request against an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Existing settings already cover the request
    Keep,
    /// Filter or repeat differ; the entry is shared unchanged, callers get a
    /// policy warning
    KeepWarnSampling,
    /// The quality union is stricter than the existing settings; mutate the
    /// entry to these params and reload from source
    Reload(ImageParams),
    /// Incompatible cube topology; programmer error
    CubeConflict,
}

/// Reconcile a request against the params an entry already carries.
///
/// Quality union: downsizing stays allowed only if both sides allow it, and
/// the higher quality depth wins. An entry never downgrades, so repeating an
/// older low-quality request after an upgrade is a no-op.
pub fn reconcile(existing: &ImageParams, requested: &ImageParams) -> Reconcile {
    if existing.cube != requested.cube {
        return Reconcile::CubeConflict;
    }
    if existing.filter != requested.filter || existing.repeat != requested.repeat {
        return Reconcile::KeepWarnSampling;
    }

    let union = ImageParams {
        allow_downsize: existing.allow_downsize && requested.allow_downsize,
        depth: existing.depth.max(requested.depth),
        ..*existing
    };
    if union == *existing {
        return Reconcile::Keep;
    }
    Reconcile::Reload(union)
}
