//! Tree structure inference.
//!
//! Sources often record sections without reliable parent links. With
//! thickness damping on, a section whose first sample overlaps another
//! section's last sample is taken to be its child. The analyzer then orders
//! sections so every section is visited after its parent.

use glam::Vec3;

use super::Section;
use crate::config::{RadiusCorrection, SectionTypes};

/// Inferred parent/children links, indexed by section position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphologyTreeStructure {
    pub parent: Vec<Option<usize>>,
    pub children: Vec<Vec<usize>>,
    /// Section positions in synthesis order
    pub traversal_order: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    position: Vec3,
    radius: f32,
}

impl Endpoint {
    fn overlaps(&self, other: &Endpoint) -> bool {
        self.position.distance(other.position) < self.radius + other.radius
    }
}

/// Whether a section takes part in synthesis at all.
pub fn is_active(section: &Section, types: &SectionTypes) -> bool {
    !section.is_empty()
        && section.section_type != super::SectionType::Soma
        && types.includes(section.section_type)
}

/// Builds the tree structure of `sections`.
///
/// Inactive sections (empty, soma typed, or filtered out by `types`) are
/// never parented and never traversed.
pub fn analyze(
    sections: &[Section],
    types: &SectionTypes,
    dampen_thickness: bool,
    radius: RadiusCorrection,
) -> MorphologyTreeStructure {
    let n = sections.len();
    let active: Vec<bool> = sections.iter().map(|s| is_active(s, types)).collect();
    let mut tree = MorphologyTreeStructure {
        parent: vec![None; n],
        children: vec![Vec::new(); n],
        traversal_order: Vec::with_capacity(n),
    };

    if !dampen_thickness {
        tree.traversal_order = (0..n).filter(|&i| active[i]).collect();
        return tree;
    }

    let endpoint = |sample: Option<&super::Sample>| {
        sample.map(|s| Endpoint {
            position: s.position,
            radius: radius.apply(s.radius),
        })
    };
    let ends: Vec<Option<(Endpoint, Endpoint)>> = sections
        .iter()
        .zip(&active)
        .map(|(s, &on)| {
            if !on {
                return None;
            }
            Some((endpoint(s.first())?, endpoint(s.last())?))
        })
        .collect();

    for i in 0..n {
        let Some((begin_i, end_i)) = ends[i] else { continue };
        for j in (i + 1)..n {
            let Some((begin_j, end_j)) = ends[j] else { continue };
            if begin_j.overlaps(&end_i) {
                if tree.parent[j].is_none() {
                    tree.parent[j] = Some(i);
                    tree.children[i].push(j);
                }
            } else if begin_i.overlaps(&end_j) && tree.parent[i].is_none() {
                tree.parent[i] = Some(j);
                tree.children[j].push(i);
            }
        }
    }

    let mut visited = vec![false; n];
    let roots: Vec<usize> = (0..n).filter(|&i| active[i] && tree.parent[i].is_none()).collect();
    traverse(&mut tree, roots, &mut visited);

    // Overlap chains can close into a loop with no root; cut each loop at
    // its lowest index so the order stays parent-first.
    for i in 0..n {
        if active[i] && !visited[i] {
            log::warn!("section {} is part of a parent cycle, detaching it", i);
            if let Some(p) = tree.parent[i].take() {
                tree.children[p].retain(|&c| c != i);
            }
            traverse(&mut tree, vec![i], &mut visited);
        }
    }

    tree
}

/// Stack preorder: roots pushed in order, children pushed in insertion order.
fn traverse(tree: &mut MorphologyTreeStructure, roots: Vec<usize>, visited: &mut [bool]) {
    let mut stack = roots;
    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        tree.traversal_order.push(idx);
        stack.extend(tree.children[idx].iter().copied().filter(|&c| !visited[c]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::{Sample, SectionType};

    fn section(id: u32, samples: &[(f32, f32)]) -> Section {
        Section::new(
            id,
            SectionType::Dendrite,
            samples.iter().map(|&(x, r)| Sample::new(x, 0.0, 0.0, r)).collect(),
        )
    }

    fn order_position(tree: &MorphologyTreeStructure, idx: usize) -> usize {
        tree.traversal_order.iter().position(|&i| i == idx).unwrap()
    }

    #[test]
    fn test_overlap_infers_parent() {
        let a = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let b = section(2, &[(10.5, 1.0), (20.0, 1.0)]);
        let tree = analyze(&[a, b], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(tree.parent, vec![None, Some(0)]);
        assert_eq!(tree.children[0], vec![1]);
        assert_eq!(tree.traversal_order, vec![0, 1]);
    }

    #[test]
    fn test_reverse_overlap_parents_earlier_section() {
        // b's end touches a's begin, so a hangs off b
        let a = section(1, &[(20.0, 1.0), (30.0, 1.0)]);
        let b = section(2, &[(0.0, 1.0), (19.5, 1.0)]);
        let tree = analyze(&[a, b], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(tree.parent, vec![Some(1), None]);
        assert_eq!(tree.traversal_order, vec![1, 0]);
    }

    #[test]
    fn test_first_parent_wins() {
        let a = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let b = section(2, &[(5.0, 1.0), (10.0, 1.0)]);
        let c = section(3, &[(10.2, 1.0), (15.0, 1.0)]);
        let tree = analyze(&[a, b, c], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(tree.parent[2], Some(0));
        assert!(tree.children[1].is_empty());
    }

    #[test]
    fn test_no_damping_keeps_input_order() {
        let a = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let b = section(2, &[(10.5, 1.0), (20.0, 1.0)]);
        let tree = analyze(&[a, b], &SectionTypes::default(), false, RadiusCorrection::default());
        assert_eq!(tree.parent, vec![None, None]);
        assert_eq!(tree.children, vec![Vec::<usize>::new(), Vec::new()]);
        assert_eq!(tree.traversal_order, vec![0, 1]);
    }

    #[test]
    fn test_empty_section_is_skipped() {
        let a = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let empty = section(2, &[]);
        let c = section(3, &[(10.5, 1.0), (20.0, 1.0)]);
        for dampen in [true, false] {
            let tree = analyze(
                &[a.clone(), empty.clone(), c.clone()],
                &SectionTypes::default(),
                dampen,
                RadiusCorrection::default(),
            );
            assert!(!tree.traversal_order.contains(&1));
            assert_eq!(tree.parent[1], None);
            assert_eq!(tree.traversal_order.len(), 2);
        }
    }

    #[test]
    fn test_filtered_type_is_skipped() {
        let mut axon = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        axon.section_type = SectionType::Axon;
        let dendrite = section(2, &[(10.5, 1.0), (20.0, 1.0)]);
        let types = SectionTypes { axon: false, ..SectionTypes::default() };
        let tree = analyze(&[axon, dendrite], &types, true, RadiusCorrection::default());
        assert_eq!(tree.traversal_order, vec![1]);
        assert_eq!(tree.parent[1], None);
    }

    #[test]
    fn test_radius_correction_drives_overlap() {
        let a = section(1, &[(0.0, 0.1), (10.0, 0.1)]);
        let b = section(2, &[(11.0, 0.1), (20.0, 0.1)]);
        let plain = analyze(&[a.clone(), b.clone()], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(plain.parent[1], None);
        let fat = RadiusCorrection { multiplier: 1.0, fixed: 0.6 };
        let tree = analyze(&[a, b], &SectionTypes::default(), true, fat);
        assert_eq!(tree.parent[1], Some(0));
    }

    #[test]
    fn test_parents_precede_children() {
        // A small fan: 0 -> {1, 2}, 2 -> 3
        let s0 = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let s1 = section(2, &[(10.5, 1.0), (20.0, 1.0)]);
        let s2 = section(3, &[(10.2, 1.0), (30.0, 1.0)]);
        let s3 = section(4, &[(30.4, 1.0), (40.0, 1.0)]);
        let tree = analyze(&[s0, s1, s2, s3], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(tree.traversal_order.len(), 4);
        for (child, parent) in tree.parent.iter().enumerate() {
            if let Some(p) = *parent {
                assert!(order_position(&tree, p) < order_position(&tree, child));
            }
        }
    }

    #[test]
    fn test_cycle_is_broken() {
        // 0 -> 1 (begin 1 touches end 0), 2 -> 0 (begin 0 touches end 2),
        // 1 -> 2 (begin 2 touches end 1): no root.
        let s0 = section(1, &[(0.0, 1.0), (10.0, 1.0)]);
        let s1 = section(2, &[(10.0, 1.0), (20.0, 1.0)]);
        let s2 = section(3, &[(20.0, 1.0), (0.0, 1.0)]);
        let tree = analyze(&[s0, s1, s2], &SectionTypes::default(), true, RadiusCorrection::default());
        assert_eq!(tree.traversal_order.len(), 3);
        for (child, parent) in tree.parent.iter().enumerate() {
            if let Some(p) = *parent {
                assert!(order_position(&tree, p) < order_position(&tree, child));
            }
        }
    }
}
