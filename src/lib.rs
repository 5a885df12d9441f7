pub mod config;
pub mod error;
pub mod geometry;
pub mod morphology;
pub mod synth;

// Shared scene buffer + circuit driver (GPU layout behind `gpu-export`)
pub mod scene;

pub use config::{ColorScheme, Quality, SdfSwitches, SectionTypes, SynthesisConfig, UserDataType};
pub use error::{ConfigParseError, SynthesisError};
pub use geometry::{Bounds, Owner, Primitive, Shape, ShapeKind};
pub use morphology::{
    CompartmentReport, Morphology, MorphologyInput, MorphologySource, Sample, Section, SectionType,
    Soma, SynapseContact, SynapseSet, SynapseType,
};
pub use scene::{synthesize_circuit, SceneBuffer};
pub use synth::{synthesize, MorphologyGeometry, MorphologySummary};
