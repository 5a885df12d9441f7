//! Morphology → primitive synthesis.
//!
//! Pipeline (one morphology, single threaded):
//!   1. `morphology::tree::analyze` orders the sections
//!   2. `soma`: soma sphere or SDF connectors, nucleus and soma mitochondria
//!   3. `sections`: spheres and segments along every section
//!   4. `organelles`: mitochondria chains inside axon sections
//!   5. `connectivity`: bifurcation edges
//!   6. `synapses`: spine geometry for afferent/efferent contacts
//!   7. `SdfMorphologyData::finalize`: closure, world transform, summary

pub mod buffer;
pub mod connectivity;
mod organelles;
mod sections;
mod soma;
mod synapses;

pub use buffer::{MorphologyGeometry, SdfMorphologyData};
pub use organelles::OrganelleBudget;

use std::collections::BTreeMap;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{SynthesisConfig, UserDataType};
use crate::error::SynthesisError;
use crate::geometry::math::almost_equal;
use crate::geometry::{Bounds, Primitive, PrimitiveTag, Shape, ShapeKind};
use crate::morphology::{tree, CompartmentReport, Morphology, MorphologySource};

// ── Derived materials ──

pub const AFFERENT_SYNAPSE_MATERIAL_OFFSET: usize = 5;
pub const EFFERENT_SYNAPSE_MATERIAL_OFFSET: usize = 6;
pub const MITOCHONDRION_MATERIAL_OFFSET: usize = 7;
pub const NUCLEUS_MATERIAL_OFFSET: usize = 8;

// ── Summary ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganelleStats {
    pub nucleus: bool,
    pub soma_chains: usize,
    pub soma_target_volume: f32,
    pub soma_volume: f32,
    pub section_mitochondria: usize,
    /// Axon sections whose mitochondria budget could not be filled
    pub unmet_section_budgets: usize,
}

impl OrganelleStats {
    pub fn budget_met(&self) -> bool {
        self.unmet_section_budgets == 0 && self.soma_volume >= self.soma_target_volume
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynapseStats {
    pub spines: usize,
    pub discarded_on_soma: usize,
    /// Contacts whose section/segment did not resolve
    pub fallback_radius: usize,
}

/// Per-morphology facts gathered during synthesis. Bounds and soma position
/// are in the morphology's local frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphologySummary {
    pub morphology: u64,
    pub soma_position: Vec3,
    pub bounds: Bounds,
    pub max_distance_to_soma: f32,
    pub primitive_count: usize,
    pub sdf_count: usize,
    pub kinds: BTreeMap<ShapeKind, usize>,
    pub organelles: OrganelleStats,
    pub synapses: SynapseStats,
}

/// Mixes the configured seed with a morphology id.
pub fn morphology_seed(seed: u64, morphology: u64) -> u64 {
    seed ^ morphology.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Synthesizes one morphology into finalized geometry.
pub fn synthesize<S>(source: &S, config: &SynthesisConfig) -> Result<MorphologyGeometry, SynthesisError>
where
    S: MorphologySource + ?Sized,
{
    config.validate()?;
    let morphology = source.morphology();
    let mut synth = Synthesizer::new(config, morphology, source.compartment_report());

    if config.section_types.soma_only() {
        synth.add_point_soma();
    } else {
        let tree = tree::analyze(
            morphology.sections(),
            &config.section_types,
            config.dampen_thickness,
            config.radius,
        );
        if config.section_types.soma {
            synth.add_soma();
        }
        synth.add_sections(&tree);
        connectivity::connect_bifurcations(&mut synth.data, &tree, morphology.id)?;
        if let Some(set) = source.synapses() {
            synth.add_synapses(set);
        }
    }

    let geometry = synth.finish();
    log::info!(
        "morphology {}: {} primitives ({} sdf), max distance to soma {:.2}",
        morphology.id,
        geometry.summary.primitive_count,
        geometry.summary.sdf_count,
        geometry.summary.max_distance_to_soma
    );
    Ok(geometry)
}

// ── Group ids ──

/// Hands out blending group ids in allocation order.
#[derive(Debug, Default)]
struct GroupAllocator {
    next: u32,
}

impl GroupAllocator {
    fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Reserves `count` consecutive ids and returns the first.
    fn reserve(&mut self, count: usize) -> u32 {
        let base = self.next;
        self.next += count as u32;
        base
    }
}

// ── Synthesizer ──

struct Synthesizer<'a> {
    config: &'a SynthesisConfig,
    morphology: &'a Morphology,
    report: Option<&'a CompartmentReport>,
    rng: StdRng,
    data: SdfMorphologyData,
    groups: GroupAllocator,
    summary: MorphologySummary,
}

impl<'a> Synthesizer<'a> {
    fn new(
        config: &'a SynthesisConfig,
        morphology: &'a Morphology,
        report: Option<&'a CompartmentReport>,
    ) -> Self {
        let summary = MorphologySummary {
            morphology: morphology.id,
            soma_position: morphology.soma().centroid,
            ..MorphologySummary::default()
        };
        Self {
            config,
            morphology,
            report,
            rng: StdRng::seed_from_u64(morphology_seed(config.seed, morphology.id)),
            data: SdfMorphologyData::new(),
            groups: GroupAllocator::default(),
            summary,
        }
    }

    fn corrected(&self, radius: f32) -> f32 {
        self.config.radius.apply(radius)
    }

    fn derived_material(&self, offset: usize) -> usize {
        self.config.base_material + offset
    }

    /// User data carried by soma primitives.
    fn soma_user_data(&self) -> Option<u64> {
        match self.config.user_data {
            UserDataType::Undefined => None,
            UserDataType::DistanceToSoma => Some(0),
            UserDataType::SimulationOffset => self.report.map(CompartmentReport::soma_offset),
        }
    }

    fn add_sphere(&mut self, sdf: bool, center: Vec3, radius: f32, tag: PrimitiveTag, displacement: [f32; 3]) -> usize {
        let shape = if sdf {
            Shape::SdfSphere { center, radius, displacement }
        } else {
            Shape::Sphere { center, radius }
        };
        self.data.push(Primitive::new(shape, tag))
    }

    /// Pill/cylinder when both radii match, cone-pill/cone otherwise.
    #[allow(clippy::too_many_arguments)]
    fn add_segment(
        &mut self,
        sdf: bool,
        p0: Vec3,
        r0: f32,
        p1: Vec3,
        r1: f32,
        tag: PrimitiveTag,
        displacement: [f32; 3],
    ) -> usize {
        let same = almost_equal(r0, r1);
        let shape = match (sdf, same) {
            (true, true) => Shape::SdfPill { p0, p1, radius: r0, displacement },
            (true, false) => Shape::SdfConePill { p0, p1, r0, r1, displacement },
            (false, true) => Shape::Cylinder { p0, p1, radius: r0 },
            (false, false) => Shape::Cone { p0, p1, r0, r1 },
        };
        self.data.push(Primitive::new(shape, tag))
    }

    fn finish(self) -> MorphologyGeometry {
        self.data.finalize(
            self.morphology.transform(),
            self.config.align_to_grid,
            self.summary,
        )
    }
}
