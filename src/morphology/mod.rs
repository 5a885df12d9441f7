//! Morphology data model: soma, sections and samples, plus the optional
//! simulation report and synapse contacts supplied alongside a morphology.
//!
//! Loading from disk is the caller's business; anything that can hand out a
//! [`Morphology`] implements [`MorphologySource`].

pub mod tree;

use std::collections::HashMap;
use std::fmt;

use glam::{Affine3A, Vec3};

use crate::geometry::math::polyline_length;

// ── Section types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    Soma,
    Axon,
    Dendrite,
    ApicalDendrite,
}

impl SectionType {
    /// Material offset under the "by section type" color scheme.
    pub fn material_offset(self) -> usize {
        match self {
            SectionType::Soma => 1,
            SectionType::Axon => 2,
            SectionType::Dendrite => 3,
            SectionType::ApicalDendrite => 4,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionType::Soma => "soma",
            SectionType::Axon => "axon",
            SectionType::Dendrite => "dendrite",
            SectionType::ApicalDendrite => "apical dendrite",
        };
        f.write_str(name)
    }
}

// ── Samples & sections ──

/// A point on a section's center line with its radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: Vec3,
    pub radius: f32,
}

impl Sample {
    pub fn new(x: f32, y: f32, z: f32, radius: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            radius,
        }
    }
}

/// An unbranched polyline between two branch points.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Identifier assigned by the source; also the index into a
    /// [`CompartmentReport`]
    pub id: u32,
    pub section_type: SectionType,
    pub samples: Vec<Sample>,
    /// Parent as declared by the source. `None` means attached to the soma.
    pub parent: Option<u32>,
}

impl Section {
    pub fn new(id: u32, section_type: SectionType, samples: Vec<Sample>) -> Self {
        Self {
            id,
            section_type,
            samples,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Length of the whole polyline.
    pub fn length(&self) -> f32 {
        polyline_length(self.samples.iter().map(|s| s.position))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Soma {
    pub centroid: Vec3,
    pub mean_radius: f32,
    /// Ids of sections attached directly to the soma
    pub children: Vec<u32>,
}

impl Soma {
    pub fn new(centroid: Vec3, mean_radius: f32) -> Self {
        Self {
            centroid,
            mean_radius,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<u32>) -> Self {
        self.children = children;
        self
    }
}

// ── Morphology ──

/// A soma plus its non-soma sections, in the source's order.
#[derive(Debug, Clone)]
pub struct Morphology {
    pub id: u64,
    soma: Soma,
    sections: Vec<Section>,
    transform: Affine3A,
    positions: HashMap<u32, usize>,
}

impl Morphology {
    pub fn new(id: u64, soma: Soma, sections: Vec<Section>) -> Self {
        let positions = sections.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        Self {
            id,
            soma,
            sections,
            transform: Affine3A::IDENTITY,
            positions,
        }
    }

    /// Local-to-world placement, applied to every generated primitive.
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    pub fn soma(&self) -> &Soma {
        &self.soma
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn transform(&self) -> &Affine3A {
        &self.transform
    }

    /// Position in [`Morphology::sections`] of the section with `id`.
    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn section_by_id(&self, id: u32) -> Option<&Section> {
        self.position_of(id).map(|i| &self.sections[i])
    }

    /// Declared parent of the section at `index`, if it exists here.
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.sections
            .get(index)
            .and_then(|s| s.parent)
            .and_then(|id| self.position_of(id))
    }

    /// Summed polyline length of every declared ancestor of the section at
    /// `index`. Cyclic declarations stop after one lap.
    pub fn ancestors_length(&self, index: usize) -> f32 {
        let mut length = 0.0;
        let mut current = self.parent_of(index);
        let mut steps = 0;
        while let Some(p) = current {
            if p == index || steps >= self.sections.len() {
                break;
            }
            length += self.sections[p].length();
            current = self.parent_of(p);
            steps += 1;
        }
        length
    }
}

// ── Source side-data ──

/// Per-section compartment layout of a simulation report. Indexed by
/// section id; id 0 is the soma.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompartmentReport {
    pub offsets: Vec<u64>,
    pub counts: Vec<u16>,
}

impl CompartmentReport {
    pub fn new(offsets: Vec<u64>, counts: Vec<u16>) -> Self {
        Self { offsets, counts }
    }

    pub fn soma_offset(&self) -> u64 {
        self.offsets.first().copied().unwrap_or(0)
    }

    pub fn offset(&self, section_id: u32) -> Option<u64> {
        self.offsets.get(section_id as usize).copied()
    }

    pub fn count(&self, section_id: u32) -> Option<u16> {
        self.counts.get(section_id as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseType {
    Afferent,
    Efferent,
}

/// A resolved synapse: `origin` on the membrane surface, `target` at the
/// center line, both in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseContact {
    pub origin: Vec3,
    pub target: Vec3,
    pub section_id: u32,
    pub segment_id: u32,
    pub synapse_type: SynapseType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynapseSet {
    pub afferent: Vec<SynapseContact>,
    pub efferent: Vec<SynapseContact>,
}

impl SynapseSet {
    pub fn is_empty(&self) -> bool {
        self.afferent.is_empty() && self.efferent.is_empty()
    }

    pub fn len(&self) -> usize {
        self.afferent.len() + self.efferent.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SynapseContact> {
        self.afferent.iter().chain(self.efferent.iter())
    }
}

// ── MorphologySource ──

/// Anything that can provide a morphology to synthesize.
pub trait MorphologySource {
    fn morphology(&self) -> &Morphology;

    fn compartment_report(&self) -> Option<&CompartmentReport> {
        None
    }

    fn synapses(&self) -> Option<&SynapseSet> {
        None
    }
}

impl MorphologySource for Morphology {
    fn morphology(&self) -> &Morphology {
        self
    }
}

/// The two supported input flavors: a bare morphology file, or a
/// morphology paired with a simulation report.
#[derive(Debug, Clone)]
pub enum MorphologyInput {
    File {
        morphology: Morphology,
        synapses: SynapseSet,
    },
    Report {
        morphology: Morphology,
        report: CompartmentReport,
        synapses: SynapseSet,
    },
}

impl MorphologyInput {
    pub fn file(morphology: Morphology) -> Self {
        MorphologyInput::File {
            morphology,
            synapses: SynapseSet::default(),
        }
    }

    pub fn with_report(morphology: Morphology, report: CompartmentReport) -> Self {
        MorphologyInput::Report {
            morphology,
            report,
            synapses: SynapseSet::default(),
        }
    }

    pub fn with_synapses(mut self, set: SynapseSet) -> Self {
        match &mut self {
            MorphologyInput::File { synapses, .. } | MorphologyInput::Report { synapses, .. } => {
                *synapses = set;
            }
        }
        self
    }
}

impl MorphologySource for MorphologyInput {
    fn morphology(&self) -> &Morphology {
        match self {
            MorphologyInput::File { morphology, .. } | MorphologyInput::Report { morphology, .. } => {
                morphology
            }
        }
    }

    fn compartment_report(&self) -> Option<&CompartmentReport> {
        match self {
            MorphologyInput::File { .. } => None,
            MorphologyInput::Report { report, .. } => Some(report),
        }
    }

    fn synapses(&self) -> Option<&SynapseSet> {
        let set = match self {
            MorphologyInput::File { synapses, .. } | MorphologyInput::Report { synapses, .. } => synapses,
        };
        (!set.is_empty()).then_some(set)
    }
}
