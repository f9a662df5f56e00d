//! Projector pattern identities.

/// Something the projector can display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pattern {
    /// One Gray code bit plane, columns bright where the bit is clear.
    BitPlane { bit: u32, inverted: bool },
    /// Horizontal cosine fringe.
    Sinusoid { period: u32, shift: f64 },
    /// Uniform illumination.
    FlatField { brightness: u8 },
}

impl Pattern {
    pub fn bit_plane(bit: u32, inverted: bool) -> Self {
        Pattern::BitPlane { bit, inverted }
    }

    /// White reference at the rig's usual 150/255.
    pub fn white() -> Self {
        Pattern::FlatField { brightness: 150 }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::BitPlane { bit, inverted: false } => write!(f, "Bit {}", bit),
            Pattern::BitPlane { bit, inverted: true } => write!(f, "Bit {} (inverted)", bit),
            Pattern::Sinusoid { period, shift } => write!(f, "Sinusoid {}px +{:.1}", period, shift),
            Pattern::FlatField { brightness } => write!(f, "Flat {}", brightness),
        }
    }
}
