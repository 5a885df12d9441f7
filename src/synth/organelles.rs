//! Procedural sub-cellular detail: nucleus and mitochondria chains.
//!
//! Everything here draws from the synthesizer's seeded RNG, so the same seed
//! and morphology always give the same organelles.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;

use super::sections::SectionStats;
use super::{Synthesizer, MITOCHONDRION_MATERIAL_OFFSET, NUCLEUS_MATERIAL_OFFSET};
use crate::geometry::math::{cone_volume, project_into_shell, random_direction, random_point_in_shell, sphere_volume};
use crate::geometry::{displacement, Owner, PrimitiveTag};
use crate::morphology::Section;

pub const NUCLEUS_RADIUS_RATIO: f32 = 0.8;
/// Soma mitochondrion radius relative to the soma radius
pub const MITOCHONDRION_RADIUS_RATIO: f32 = 0.05;
/// Axon mitochondrion radius relative to the local section radius
pub const SECTION_MITOCHONDRION_RADIUS_RATIO: f32 = 0.25;
/// Section length covered by one mitochondrion slot
pub const MITOCHONDRION_SLOT_LENGTH: f32 = 0.25;

const MIN_CHAIN_LENGTH: usize = 2;
const MAX_CHAIN_LENGTH: usize = 19;
const JITTER_RATIO: f32 = 0.1;
const NUCLEUS_DISPLACEMENT_RATIO: f32 = 1.0;
const MITOCHONDRION_DISPLACEMENT_RATIO: f32 = 5.0;

/// Volume to fill and volume filled so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganelleBudget {
    pub target: f32,
    pub consumed: f32,
}

impl OrganelleBudget {
    pub fn new(target: f32) -> Self {
        Self { target, consumed: 0.0 }
    }

    pub fn is_met(&self) -> bool {
        self.consumed >= self.target
    }

    pub fn consume(&mut self, volume: f32) {
        self.consumed += volume;
    }
}

fn chain_length(rng: &mut StdRng) -> usize {
    rng.random_range(MIN_CHAIN_LENGTH..=MAX_CHAIN_LENGTH)
}

fn jitter(rng: &mut StdRng, p: Vec3, radius: f32) -> Vec3 {
    let amount = JITTER_RATIO * radius;
    p + Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    ) * amount
}

fn size_factor(rng: &mut StdRng) -> f32 {
    rng.random_range(1.0..1.5)
}

impl Synthesizer<'_> {
    fn organelle_tag(&mut self, material_offset: usize) -> PrimitiveTag {
        PrimitiveTag {
            material_id: self.derived_material(material_offset),
            user_data: None,
            owner: Owner::Group,
            group_id: self.groups.allocate(),
        }
    }

    /// Nucleus plus random-walk mitochondria chains in the shell between
    /// the nucleus and the soma surface.
    pub(super) fn add_soma_internals(&mut self) {
        let density = self.config.organelle_density;
        if !self.config.generate_internals || density <= 0.0 {
            return;
        }
        let center = self.morphology.soma().centroid;
        let soma_radius = self.corrected(self.morphology.soma().mean_radius);
        if soma_radius <= 0.0 {
            return;
        }

        let nucleus_radius = soma_radius * NUCLEUS_RADIUS_RATIO;
        let tag = self.organelle_tag(NUCLEUS_MATERIAL_OFFSET);
        self.add_sphere(
            self.config.sdf.nucleus,
            center,
            nucleus_radius,
            tag,
            displacement(NUCLEUS_DISPLACEMENT_RATIO),
        );
        self.summary.organelles.nucleus = true;

        let sdf = self.config.sdf.mitochondria;
        let disp = displacement(MITOCHONDRION_DISPLACEMENT_RATIO);
        let base_radius = soma_radius * MITOCHONDRION_RADIUS_RATIO;
        let inner = nucleus_radius + base_radius;
        let mut budget = OrganelleBudget::new(sphere_volume(soma_radius) * density);
        let mut chains = 0;

        while !budget.is_met() {
            let length = chain_length(&mut self.rng);
            let tag = self.organelle_tag(MITOCHONDRION_MATERIAL_OFFSET);
            let mut point = random_point_in_shell(&mut self.rng, inner, soma_radius);
            let mut previous: Option<(Vec3, f32, usize)> = None;

            for _ in 0..length {
                let radius = base_radius * size_factor(&mut self.rng);
                let position = center + point;
                let sphere = self.add_sphere(sdf, position, radius, tag, disp);
                budget.consume(sphere_volume(radius));
                if let Some((p, r, before)) = previous {
                    let link = self.add_segment(sdf, p, r, position, radius, tag, disp);
                    budget.consume(cone_volume(p.distance(position), r, radius));
                    if sdf {
                        self.data.connect_all(&[before, link, sphere]);
                    }
                }
                previous = Some((position, radius, sphere));
                let step = random_direction(&mut self.rng) * radius * 2.0;
                point = project_into_shell(point + step, inner, soma_radius);
            }
            chains += 1;
        }

        let stats = &mut self.summary.organelles;
        stats.soma_chains = chains;
        stats.soma_target_volume = budget.target;
        stats.soma_volume = budget.consumed;
        log::debug!(
            "morphology {}: {} soma mitochondria chains, volume {:.3}/{:.3}",
            self.morphology.id,
            chains,
            budget.consumed,
            budget.target
        );
    }

    /// Mitochondria chains placed in fixed-length slots along an axon
    /// section. Short sections may not reach their budget.
    pub(super) fn add_section_mitochondria(&mut self, section: &Section, stats: SectionStats) {
        let samples = &section.samples;
        let n = samples.len();
        let slots = (stats.length / MITOCHONDRION_SLOT_LENGTH) as usize;
        if slots == 0 || n < 2 {
            return;
        }

        let sdf = self.config.sdf.mitochondria;
        let disp = displacement(MITOCHONDRION_DISPLACEMENT_RATIO);
        let index_ratio = n as f32 / slots as f32;
        let mut budget = OrganelleBudget::new(stats.volume * self.config.organelle_density);
        let mut length = chain_length(&mut self.rng);
        let mut countdown = -(self.rng.random_range(0..=slots / 10) as i64);
        let mut tag: Option<PrimitiveTag> = None;
        let mut previous: Option<(Vec3, f32, usize)> = None;
        let mut placed = 0;

        for slot in 0..slots {
            let fractional = slot as f32 * index_ratio;
            let src = fractional as usize;
            let in_chain = countdown >= 0 && (countdown as usize) < length;

            if !budget.is_met() && in_chain && src + 1 < n {
                let src_radius = self.corrected(samples[src].radius);
                let next_radius = self.corrected(samples[src + 1].radius);
                let a = jitter(&mut self.rng, samples[src].position, src_radius);
                let b = jitter(&mut self.rng, samples[src + 1].position, next_radius);
                let position = a.lerp(b, fractional - src as f32);
                let radius = src_radius * SECTION_MITOCHONDRION_RADIUS_RATIO * size_factor(&mut self.rng);

                let chain_tag = match tag {
                    Some(t) => t,
                    None => {
                        let t = self.organelle_tag(MITOCHONDRION_MATERIAL_OFFSET);
                        tag = Some(t);
                        t
                    }
                };
                let sphere = self.add_sphere(sdf, position, radius, chain_tag, disp);
                budget.consume(sphere_volume(radius));
                if let (true, Some((p, r, before))) = (countdown > 0, previous) {
                    let link = self.add_segment(sdf, p, r, position, radius, chain_tag, disp);
                    budget.consume(cone_volume(p.distance(position), r, radius));
                    if sdf {
                        self.data.connect_all(&[before, link, sphere]);
                    }
                }
                previous = Some((position, radius, sphere));
                placed += 1;
            }

            countdown += 1;
            if countdown >= length as i64 {
                countdown = -(self.rng.random_range(0..=slots / 10) as i64);
                length = chain_length(&mut self.rng);
                tag = None;
                previous = None;
            }
        }

        self.summary.organelles.section_mitochondria += placed;
        if !budget.is_met() {
            self.summary.organelles.unmet_section_budgets += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::geometry::ShapeKind;
    use crate::morphology::{Morphology, Sample, SectionType, Soma};
    use crate::synth::synthesize;

    fn long_axon() -> Morphology {
        let samples = (0..=40).map(|i| Sample::new(5.0 + i as f32, 0.0, 0.0, 2.0)).collect();
        let axon = Section::new(1, SectionType::Axon, samples);
        Morphology::new(11, Soma::new(Vec3::new(0.0, 0.0, 0.0), 4.0).with_children(vec![1]), vec![axon])
    }

    #[test]
    fn test_budget() {
        let mut b = OrganelleBudget::new(2.0);
        assert!(!b.is_met());
        b.consume(1.5);
        assert!(!b.is_met());
        b.consume(1.0);
        assert!(b.is_met());
        assert!(OrganelleBudget::new(0.0).is_met());
    }

    #[test]
    fn test_soma_mitochondria_stay_inside_soma() {
        let config = SynthesisConfig::default().with_internals(0.2).with_seed(3);
        let m = long_axon();
        let geometry = synthesize(&m, &config).unwrap();
        let material = MITOCHONDRION_MATERIAL_OFFSET;
        let soma_radius = 4.0;
        for p in geometry.primitives.iter().filter(|p| p.material_id == material) {
            if p.kind() != ShapeKind::SdfSphere {
                continue;
            }
            let (c, _) = p.shape.endpoints();
            // The axon starts outside the soma, so anything this close is a
            // soma mitochondrion
            if c.length() <= soma_radius + 0.001 {
                assert!(c.length() >= soma_radius * (NUCLEUS_RADIUS_RATIO + MITOCHONDRION_RADIUS_RATIO) - 0.001);
            }
        }
    }

    #[test]
    fn test_nucleus_geometry() {
        let config = SynthesisConfig::default().with_internals(0.05);
        let geometry = synthesize(&long_axon(), &config).unwrap();
        let nuclei: Vec<_> = geometry
            .primitives
            .iter()
            .filter(|p| p.material_id == NUCLEUS_MATERIAL_OFFSET)
            .collect();
        assert_eq!(nuclei.len(), 1);
        assert!((nuclei[0].shape.radii().0 - 3.2).abs() < 0.001);
        assert_eq!(nuclei[0].owner, Owner::Group);
    }

    #[test]
    fn test_chains_have_own_groups() {
        let config = SynthesisConfig::default().with_internals(0.1).with_seed(5);
        let geometry = synthesize(&long_axon(), &config).unwrap();
        let branch_groups: Vec<u32> = geometry
            .primitives
            .iter()
            .filter(|p| matches!(p.owner, Owner::Section(_)))
            .map(|p| p.group_id)
            .collect();
        for p in geometry.primitives.iter().filter(|p| p.material_id == MITOCHONDRION_MATERIAL_OFFSET) {
            assert!(!branch_groups.contains(&p.group_id));
        }
    }

    #[test]
    fn test_axon_mitochondria_are_placed() {
        let density = 0.05;
        let config = SynthesisConfig::default().with_internals(density).with_seed(1);
        let geometry = synthesize(&long_axon(), &config).unwrap();
        let stats = &geometry.summary.organelles;
        assert!(stats.section_mitochondria > 0);
        for p in geometry.primitives.iter().filter(|p| p.material_id == MITOCHONDRION_MATERIAL_OFFSET) {
            if p.kind() == ShapeKind::SdfSphere {
                let (c, _) = p.shape.endpoints();
                if c.x > 4.5 {
                    // Jitter is bounded by 10% of the section radius
                    assert!(c.y.abs() <= 0.2 + 0.001 && c.z.abs() <= 0.2 + 0.001);
                    let r = p.shape.radii().0;
                    assert!((0.5 - 0.001..0.75 + 0.001).contains(&r));
                }
            }
        }
    }

    #[test]
    fn test_zero_density_skips_everything() {
        let config = SynthesisConfig::default().with_internals(0.0);
        let geometry = synthesize(&long_axon(), &config).unwrap();
        assert_eq!(geometry.summary.organelles.section_mitochondria, 0);
        assert!(geometry
            .primitives
            .iter()
            .all(|p| p.material_id != MITOCHONDRION_MATERIAL_OFFSET && p.material_id != NUCLEUS_MATERIAL_OFFSET));
    }

    #[test]
    fn test_axon_chains_are_separated_by_gaps() {
        // Unit-radius spheres never fill a radius 2 axon, so only the gaps
        // between chains keep slots empty
        let m = long_axon();
        let slots = (m.sections()[0].length() / MITOCHONDRION_SLOT_LENGTH) as usize;
        let mut total = 0;
        for seed in 0..10 {
            let config = SynthesisConfig::default().with_internals(1.0).with_seed(seed);
            let geometry = synthesize(&m, &config).unwrap();
            let axon: Vec<usize> = (0..geometry.primitives.len())
                .filter(|&i| {
                    let p = &geometry.primitives[i];
                    p.material_id == MITOCHONDRION_MATERIAL_OFFSET && p.shape.endpoints().0.x > 4.5
                })
                .collect();

            let mut chains: std::collections::BTreeMap<u32, (usize, f32)> = Default::default();
            for &i in &axon {
                let p = &geometry.primitives[i];
                if p.kind() == ShapeKind::SdfSphere {
                    let entry = chains.entry(p.group_id).or_insert((0, f32::NEG_INFINITY));
                    entry.0 += 1;
                    entry.1 = entry.1.max(p.shape.endpoints().0.x);
                }
                for &n in &geometry.neighbours[i] {
                    assert_eq!(geometry.primitives[n].group_id, p.group_id, "link leaves its chain");
                }
            }
            assert!(chains.len() > 1, "seed {}: a single chain", seed);

            // The last chain may be cut short by the end of the section
            let last = chains
                .iter()
                .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
                .map(|(&g, _)| g);
            let mut placed = 0;
            for (group, (count, _)) in &chains {
                assert!(*count <= MAX_CHAIN_LENGTH, "seed {}: chain of {}", seed, count);
                if Some(*group) != last {
                    assert!(*count >= MIN_CHAIN_LENGTH, "seed {}: chain of {}", seed, count);
                }
                placed += count;
            }
            assert_eq!(placed, geometry.summary.organelles.section_mitochondria);
            assert!(placed < slots);
            total += placed;
        }
        // Chains average ~10.5 spheres with gaps of up to slots / 10 after each
        assert!(total < 10 * (slots - slots / 10), "total = {}", total);
    }
}
