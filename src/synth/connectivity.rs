//! SDF blending graph: soma connector clique, bifurcation edges and the
//! bounded transitive closure applied at finalize.

use std::collections::BTreeSet;

use super::buffer::SdfMorphologyData;
use crate::error::SynthesisError;
use crate::morphology::tree::MorphologyTreeStructure;

/// Rounds of neighbor-set union applied to the graph.
pub const CLOSURE_ROUNDS: usize = 4;

/// Links each section's bifurcation sphere to the primitives of its child
/// sections and of itself that touch it.
///
/// A candidate `c` touches the bifurcation `b` when either endpoint of `c`
/// lies within `c.r0 + b.r0` of `b`'s center.
pub fn connect_bifurcations(
    data: &mut SdfMorphologyData,
    tree: &MorphologyTreeStructure,
    morphology: u64,
) -> Result<(), SynthesisError> {
    let bifurcations: Vec<(usize, usize)> = data.bifurcations().collect();
    let mut edges = Vec::new();

    for (section, bif) in bifurcations {
        let (b0, _) = data.primitives()[bif].shape.endpoints();
        let (br, _) = data.primitives()[bif].shape.radii();

        let children = tree.children.get(section).map(Vec::as_slice).unwrap_or(&[]);
        for &owner in children.iter().chain(std::iter::once(&section)) {
            let candidates = data.section_primitives(owner).ok_or_else(|| {
                SynthesisError::StructuralInconsistency {
                    morphology,
                    section,
                    detail: format!("no primitives registered for section {}", owner),
                }
            })?;

            for &c in candidates {
                if c == bif {
                    continue;
                }
                let shape = &data.primitives()[c].shape;
                let (p0, p1) = shape.endpoints();
                let (r0, _) = shape.radii();
                let reach = (r0 + br) * (r0 + br);
                if p0.distance_squared(b0) < reach || p1.distance_squared(b0) < reach {
                    edges.push((bif, c));
                }
            }
        }
    }

    for (a, b) in edges {
        data.connect(a, b);
    }
    Ok(())
}

/// Widens every neighbor set by `rounds` of union with its neighbors' sets.
/// Each round reads from a snapshot of the previous one.
pub fn close_neighbourhoods(neighbours: &mut [BTreeSet<usize>], rounds: usize) {
    for _ in 0..rounds {
        let snapshot = neighbours.to_vec();
        for (i, set) in snapshot.iter().enumerate() {
            for &j in set {
                for &k in &snapshot[j] {
                    neighbours[i].insert(k);
                    neighbours[k].insert(i);
                }
            }
        }
    }
}

/// Drops self references and flattens to sorted vectors.
pub fn strip_self_references(neighbours: Vec<BTreeSet<usize>>) -> Vec<Vec<usize>> {
    neighbours
        .into_iter()
        .enumerate()
        .map(|(i, set)| set.into_iter().filter(|&n| n != i).collect())
        .collect()
}
