//! Variance of type parameters and type arguments.

use std::fmt;

/// Declaration-site or use-site variance.
///
/// `Star` is the star projection (`*`): an argument about which nothing is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
    Star,
}

impl Variance {
    /// Compose the variance of a position with the variance of the argument substituted into it.
    ///
    /// Substituting `out X` into an `out` position keeps `out X`; opposite projections collapse to `*`.
    ///
    /// ## Examples
    /// ```rust
    /// use symproc_core::Variance;
    ///
    /// assert_eq!(Variance::Invariant.compose(Variance::Covariant), Variance::Covariant);
    /// assert_eq!(Variance::Covariant.compose(Variance::Contravariant), Variance::Star);
    /// ```
    pub fn compose(self, inner: Variance) -> Variance {
        match (self, inner) {
            (Variance::Star, _) | (_, Variance::Star) => Variance::Star,
            (Variance::Invariant, v) | (v, Variance::Invariant) => v,
            (a, b) if a == b => a,
            _ => Variance::Star,
        }
    }

    /// Swap covariant and contravariant.
    pub fn flip(self) -> Variance {
        match self {
            Variance::Covariant => Variance::Contravariant,
            Variance::Contravariant => Variance::Covariant,
            v => v,
        }
    }

    /// The keyword prefix used when rendering (`"out "`, `"in "`, or empty).
    pub fn label(self) -> &'static str {
        match self {
            Variance::Invariant => "",
            Variance::Covariant => "out ",
            Variance::Contravariant => "in ",
            Variance::Star => "*",
        }
    }
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variance::Invariant => write!(f, "invariant"),
            Variance::Covariant => write!(f, "out"),
            Variance::Contravariant => write!(f, "in"),
            Variance::Star => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Variance; 4] = [
        Variance::Invariant,
        Variance::Covariant,
        Variance::Contravariant,
        Variance::Star,
    ];

    #[test]
    fn test_invariant_is_identity() {
        for v in ALL {
            assert_eq!(Variance::Invariant.compose(v), v);
            assert_eq!(v.compose(Variance::Invariant), v);
        }
    }

    #[test]
    fn test_star_absorbs() {
        for v in ALL {
            assert_eq!(Variance::Star.compose(v), Variance::Star);
            assert_eq!(v.compose(Variance::Star), Variance::Star);
        }
    }

    #[test]
    fn test_same_projection_is_kept() {
        assert_eq!(Variance::Covariant.compose(Variance::Covariant), Variance::Covariant);
        assert_eq!(
            Variance::Contravariant.compose(Variance::Contravariant),
            Variance::Contravariant
        );
    }

    #[test]
    fn test_compose_is_associative() {
        for a in ALL {
            for b in ALL {
                for c in ALL {
                    assert_eq!(a.compose(b).compose(c), a.compose(b.compose(c)));
                }
            }
        }
    }

    #[test]
    fn test_flip() {
        assert_eq!(Variance::Covariant.flip(), Variance::Contravariant);
        assert_eq!(Variance::Star.flip(), Variance::Star);
    }
}
