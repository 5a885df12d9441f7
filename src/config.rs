//! Synthesis options.
//!
//! Enum options round-trip through their display names, so a host can feed
//! them straight from a property panel or command line.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigParseError, SynthesisError};
use crate::morphology::SectionType;

// ── Enum options ──

/// Sample stride along each section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Endpoints only
    Low,
    /// Stride of half the section
    Medium,
    /// Every sample
    #[default]
    High,
}

impl Quality {
    /// Stride for a section of `samples` samples (never zero).
    pub fn stride(self, samples: usize) -> usize {
        let stride = match self {
            Quality::Low => samples.saturating_sub(1),
            Quality::Medium => samples / 2,
            Quality::High => 1,
        };
        stride.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    None,
    BySectionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDataType {
    #[default]
    Undefined,
    SimulationOffset,
    DistanceToSoma,
}

macro_rules! display_names {
    ($ty:ty, $option:literal, { $($variant:path => $name:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }

        impl FromStr for $ty {
            type Err = ConfigParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($name) $(|| s.eq_ignore_ascii_case($alias))* {
                        return Ok($variant);
                    }
                )+
                Err(ConfigParseError {
                    option: $option,
                    value: s.to_string(),
                })
            }
        }
    };
}

display_names!(Quality, "quality", {
    Quality::Low => "Low",
    Quality::Medium => "Medium",
    Quality::High => "High",
});

display_names!(ColorScheme, "color scheme", {
    ColorScheme::None => "None",
    ColorScheme::BySectionType => "By section type" | "By segment type",
});

display_names!(UserDataType, "user data type", {
    UserDataType::Undefined => "Undefined",
    UserDataType::SimulationOffset => "Simulation offset",
    UserDataType::DistanceToSoma => "Distance to soma",
});

// ── Switches ──

/// Per-category choice between SDF and parametric primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdfSwitches {
    pub soma: bool,
    pub branches: bool,
    pub nucleus: bool,
    pub mitochondria: bool,
    pub synapses: bool,
}

impl SdfSwitches {
    pub fn all() -> Self {
        Self {
            soma: true,
            branches: true,
            nucleus: true,
            mitochondria: true,
            synapses: true,
        }
    }

    pub fn none() -> Self {
        Self {
            soma: false,
            branches: false,
            nucleus: false,
            mitochondria: false,
            synapses: false,
        }
    }
}

impl Default for SdfSwitches {
    fn default() -> Self {
        Self::all()
    }
}

/// Which section types are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionTypes {
    pub soma: bool,
    pub axon: bool,
    pub dendrite: bool,
    pub apical_dendrite: bool,
}

impl SectionTypes {
    pub fn includes(&self, section_type: SectionType) -> bool {
        match section_type {
            SectionType::Soma => self.soma,
            SectionType::Axon => self.axon,
            SectionType::Dendrite => self.dendrite,
            SectionType::ApicalDendrite => self.apical_dendrite,
        }
    }

    /// Only the soma is selected: the morphology collapses to a point.
    pub fn soma_only(&self) -> bool {
        self.soma && !self.axon && !self.dendrite && !self.apical_dendrite
    }
}

impl Default for SectionTypes {
    fn default() -> Self {
        Self {
            soma: true,
            axon: true,
            dendrite: true,
            apical_dendrite: true,
        }
    }
}

/// Forced radius or radius scale applied to every sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusCorrection {
    pub multiplier: f32,
    /// Non-zero: every radius becomes this value
    pub fixed: f32,
}

impl RadiusCorrection {
    #[inline]
    pub fn apply(&self, radius: f32) -> f32 {
        if self.fixed != 0.0 {
            self.fixed
        } else {
            radius * self.multiplier
        }
    }
}

impl Default for RadiusCorrection {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            fixed: 0.0,
        }
    }
}

// ── SynthesisConfig ──

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    pub quality: Quality,
    /// Infer the tree from sample overlap and clamp radius jumps
    pub dampen_thickness: bool,
    pub sdf: SdfSwitches,
    pub color_scheme: ColorScheme,
    pub user_data: UserDataType,
    /// Samples farther than this along the tree are dropped
    pub max_distance_to_soma: f32,
    /// Fraction of soma / axon volume filled with organelles, in `[0, 1]`
    pub organelle_density: f32,
    pub generate_internals: bool,
    /// Randomized intermediate sphere on synapse spines
    pub randomized_spines: bool,
    pub radius: RadiusCorrection,
    pub section_types: SectionTypes,
    pub base_material: usize,
    /// Grid cell size for snapping world positions (0 = off)
    pub align_to_grid: f32,
    pub seed: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            quality: Quality::High,
            dampen_thickness: false,
            sdf: SdfSwitches::all(),
            color_scheme: ColorScheme::None,
            user_data: UserDataType::Undefined,
            max_distance_to_soma: f32::MAX,
            organelle_density: 0.0,
            generate_internals: false,
            randomized_spines: true,
            radius: RadiusCorrection::default(),
            section_types: SectionTypes::default(),
            base_material: 0,
            align_to_grid: 0.0,
            seed: 0,
        }
    }
}

impl SynthesisConfig {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_dampen_thickness(mut self, enabled: bool) -> Self {
        self.dampen_thickness = enabled;
        self
    }

    pub fn with_sdf(mut self, sdf: SdfSwitches) -> Self {
        self.sdf = sdf;
        self
    }

    pub fn with_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = scheme;
        self
    }

    pub fn with_user_data(mut self, user_data: UserDataType) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_max_distance_to_soma(mut self, distance: f32) -> Self {
        self.max_distance_to_soma = distance;
        self
    }

    /// Enables organelle generation at the given density.
    pub fn with_internals(mut self, density: f32) -> Self {
        self.generate_internals = true;
        self.organelle_density = density;
        self
    }

    pub fn with_randomized_spines(mut self, enabled: bool) -> Self {
        self.randomized_spines = enabled;
        self
    }

    pub fn with_radius_multiplier(mut self, multiplier: f32) -> Self {
        self.radius.multiplier = multiplier;
        self
    }

    pub fn with_radius_correction(mut self, fixed: f32) -> Self {
        self.radius.fixed = fixed;
        self
    }

    pub fn with_section_types(mut self, types: SectionTypes) -> Self {
        self.section_types = types;
        self
    }

    pub fn with_base_material(mut self, material: usize) -> Self {
        self.base_material = material;
        self
    }

    pub fn with_align_to_grid(mut self, cell: f32) -> Self {
        self.align_to_grid = cell;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Material id for a section type under the active color scheme.
    pub fn material_for(&self, section_type: SectionType) -> usize {
        match self.color_scheme {
            ColorScheme::None => self.base_material,
            ColorScheme::BySectionType => self.base_material + section_type.material_offset(),
        }
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        let invalid = |field: &'static str, detail: String| SynthesisError::InvalidConfig { field, detail };

        if !(0.0..=1.0).contains(&self.organelle_density) {
            return Err(invalid(
                "organelle_density",
                format!("{} is outside [0, 1]", self.organelle_density),
            ));
        }
        if !self.radius.multiplier.is_finite() || self.radius.multiplier <= 0.0 {
            return Err(invalid(
                "radius_multiplier",
                format!("{} must be positive", self.radius.multiplier),
            ));
        }
        if !self.radius.fixed.is_finite() || self.radius.fixed < 0.0 {
            return Err(invalid(
                "radius_correction",
                format!("{} must be zero or positive", self.radius.fixed),
            ));
        }
        if self.max_distance_to_soma.is_nan() || self.max_distance_to_soma < 0.0 {
            return Err(invalid(
                "max_distance_to_soma",
                format!("{} must not be negative", self.max_distance_to_soma),
            ));
        }
        if !self.align_to_grid.is_finite() || self.align_to_grid < 0.0 {
            return Err(invalid(
                "align_to_grid",
                format!("{} must be zero or positive", self.align_to_grid),
            ));
        }
        Ok(())
    }
}
