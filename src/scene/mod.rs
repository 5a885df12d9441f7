//! Shared scene buffer and circuit-level synthesis.
//!
//! Each morphology is synthesized on its own with local indices, then moved
//! into the [`SceneBuffer`] in one step, where its primitives receive global
//! indices and its neighbor lists are rewritten to match.

#[cfg(feature = "gpu-export")]
pub mod packed;

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::geometry::{Bounds, Primitive};
use crate::morphology::MorphologySource;
use crate::synth::{synthesize, MorphologyGeometry, MorphologySummary};

/// Where one morphology landed in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneModel {
    pub morphology: u64,
    /// Global index range of its primitives
    pub range: Range<usize>,
    /// World-space extent of its primitives, radii included
    pub bounds: Bounds,
    pub summary: MorphologySummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationReport {
    pub morphology: u64,
    pub first_index: usize,
    pub primitives: usize,
    /// Primitive count per material id
    pub materials: BTreeMap<usize, usize>,
}

/// All consolidated primitives of a scene, global indices.
#[derive(Debug, Default)]
pub struct SceneBuffer {
    primitives: Vec<Primitive>,
    neighbours: Vec<Vec<usize>>,
    models: Vec<SceneModel>,
    materials: BTreeMap<usize, usize>,
    bounds: Bounds,
}

impl SceneBuffer {
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

    pub fn neighbours(&self, index: usize) -> &[usize] {
        self.neighbours.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn models(&self) -> &[SceneModel] {
        &self.models
    }

    pub fn model(&self, morphology: u64) -> Option<&SceneModel> {
        self.models.iter().find(|m| m.morphology == morphology)
    }

    /// World-space extent of everything consolidated so far.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Primitive count per material id over the whole scene.
    pub fn materials(&self) -> &BTreeMap<usize, usize> {
        &self.materials
    }

    /// Moves a finalized morphology into the scene.
    pub fn consolidate(&mut self, geometry: MorphologyGeometry) -> ConsolidationReport {
        let MorphologyGeometry {
            primitives,
            neighbours,
            summary,
        } = geometry;
        let first_index = self.primitives.len();
        let local_to_global: Vec<usize> = (0..primitives.len()).map(|i| first_index + i).collect();

        let mut materials = BTreeMap::new();
        let mut bounds = Bounds::default();
        for p in &primitives {
            *materials.entry(p.material_id).or_insert(0) += 1;
            *self.materials.entry(p.material_id).or_insert(0) += 1;
            let (p0, p1) = p.shape.endpoints();
            let (r0, r1) = p.shape.radii();
            bounds.merge(p0 - Vec3::splat(r0));
            bounds.merge(p0 + Vec3::splat(r0));
            bounds.merge(p1 - Vec3::splat(r1));
            bounds.merge(p1 + Vec3::splat(r1));
        }
        self.bounds.merge_bounds(&bounds);

        self.neighbours.extend(neighbours.into_iter().map(|list| {
            list.into_iter()
                .filter_map(|local| local_to_global.get(local).copied())
                .collect::<Vec<_>>()
        }));
        let count = primitives.len();
        self.primitives.extend(primitives);

        let morphology = summary.morphology;
        self.models.push(SceneModel {
            morphology,
            range: first_index..first_index + count,
            bounds,
            summary,
        });
        log::debug!(
            "consolidated morphology {}: {} primitives at {}",
            morphology,
            count,
            first_index
        );

        ConsolidationReport {
            morphology,
            first_index,
            primitives: count,
            materials,
        }
    }

    #[cfg(feature = "gpu-export")]
    pub fn packed(&self) -> packed::PackedScene {
        let mut out = packed::PackedScene {
            primitives: Vec::with_capacity(self.primitives.len()),
            neighbours: Vec::with_capacity(self.neighbours.iter().map(Vec::len).sum()),
        };
        for (p, list) in self.primitives.iter().zip(&self.neighbours) {
            let offset = out.neighbours.len() as u32;
            out.neighbours.extend(list.iter().map(|&n| n as u32));
            out.primitives
                .push(packed::PackedPrimitive::pack(p, offset, list.len() as u32));
        }
        out
    }
}

// ── Circuit ──

/// Outcome of a circuit run. Failed morphologies contributed nothing.
#[derive(Debug, Default)]
pub struct CircuitReport {
    pub loaded: Vec<u64>,
    pub failed: Vec<(u64, SynthesisError)>,
}

/// Synthesizes every source and consolidates the successful ones into
/// `scene`. Morphologies run in parallel; consolidation order follows
/// completion order.
pub fn synthesize_circuit<S>(sources: &[S], config: &SynthesisConfig, scene: &Mutex<SceneBuffer>) -> CircuitReport
where
    S: MorphologySource + Sync,
{
    let run = |source: &S| -> Result<u64, (u64, SynthesisError)> {
        let id = source.morphology().id;
        let geometry = synthesize(source, config).map_err(|e| (id, e))?;
        scene
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .consolidate(geometry);
        Ok(id)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<_> = sources.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<_> = sources.iter().map(run).collect();

    let mut report = CircuitReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(id) => report.loaded.push(id),
            Err((id, err)) => {
                log::warn!("morphology {} skipped: {}", id, err);
                report.failed.push((id, err));
            }
        }
    }
    log::info!(
        "circuit: {} morphologies loaded, {} failed",
        report.loaded.len(),
        report.failed.len()
    );
    report
}
