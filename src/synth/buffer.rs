//! Per-morphology working buffer.
//!
//! Holds every primitive of one morphology with local indices, the partial
//! neighbor sets, which primitives each section owns and each section's
//! bifurcation sphere. Built by one synthesis pass and consumed by
//! [`SdfMorphologyData::finalize`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::Affine3A;

use super::connectivity;
use super::MorphologySummary;
use crate::geometry::{Owner, Primitive, ShapeKind};

#[derive(Debug, Default)]
pub struct SdfMorphologyData {
    primitives: Vec<Primitive>,
    neighbours: Vec<BTreeSet<usize>>,
    section_primitives: HashMap<usize, Vec<usize>>,
    bifurcations: BTreeMap<usize, usize>,
}

impl SdfMorphologyData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn neighbours(&self, index: usize) -> Option<&BTreeSet<usize>> {
        self.neighbours.get(index)
    }

    /// Registers a section as synthesized, even if it ends up owning nothing.
    pub fn begin_section(&mut self, section: usize) {
        self.section_primitives.entry(section).or_default();
    }

    /// Appends a primitive and returns its local index. SDF primitives owned
    /// by a section are indexed under that section.
    pub fn push(&mut self, primitive: Primitive) -> usize {
        let index = self.primitives.len();
        if let (true, Owner::Section(section)) = (primitive.is_sdf(), primitive.owner) {
            self.section_primitives.entry(section).or_default().push(index);
        }
        self.primitives.push(primitive);
        self.neighbours.push(BTreeSet::new());
        index
    }

    /// Records the bifurcation sphere of a section. The first one sticks.
    pub fn set_bifurcation(&mut self, section: usize, index: usize) {
        self.bifurcations.entry(section).or_insert(index);
    }

    /// `(section, primitive)` pairs in ascending section order.
    pub fn bifurcations(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bifurcations.iter().map(|(&s, &p)| (s, p))
    }

    pub fn section_primitives(&self, section: usize) -> Option<&[usize]> {
        self.section_primitives.get(&section).map(Vec::as_slice)
    }

    /// Adds a symmetric edge. Self edges are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b || a >= self.neighbours.len() || b >= self.neighbours.len() {
            return;
        }
        self.neighbours[a].insert(b);
        self.neighbours[b].insert(a);
    }

    /// Links every pair of `indices` with each other.
    pub fn connect_all(&mut self, indices: &[usize]) {
        for (i, &a) in indices.iter().enumerate() {
            for &b in &indices[i + 1..] {
                self.connect(a, b);
            }
        }
    }

    /// Closes the neighbor graph, moves everything to world space and hands
    /// out the immutable result.
    pub fn finalize(
        self,
        transform: &Affine3A,
        grid: f32,
        mut summary: MorphologySummary,
    ) -> MorphologyGeometry {
        let Self {
            mut primitives,
            mut neighbours,
            ..
        } = self;

        connectivity::close_neighbourhoods(&mut neighbours, connectivity::CLOSURE_ROUNDS);
        let neighbours = connectivity::strip_self_references(neighbours);

        if *transform != Affine3A::IDENTITY || grid > 0.0 {
            for p in &mut primitives {
                p.transform(transform, grid);
            }
        }

        summary.primitive_count = primitives.len();
        summary.sdf_count = primitives.iter().filter(|p| p.is_sdf()).count();
        summary.kinds = BTreeMap::new();
        for p in &primitives {
            *summary.kinds.entry(p.kind()).or_insert(0) += 1;
        }

        MorphologyGeometry {
            primitives,
            neighbours,
            summary,
        }
    }
}

/// Finalized geometry of one morphology, local indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphologyGeometry {
    pub primitives: Vec<Primitive>,
    /// Sorted, self-free neighbor list per primitive
    pub neighbours: Vec<Vec<usize>>,
    pub summary: MorphologySummary,
}

impl MorphologyGeometry {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn count(&self, kind: ShapeKind) -> usize {
        self.summary.kinds.get(&kind).copied().unwrap_or(0)
    }
}
