//! Synapse spines.
//!
//! A spine is a large sphere at the contact's surface point, an optional
//! randomized middle sphere and tapering connectors reaching halfway to the
//! section center line.

use glam::{Affine3A, Vec3};
use rand::Rng;

use super::{Synthesizer, AFFERENT_SYNAPSE_MATERIAL_OFFSET, EFFERENT_SYNAPSE_MATERIAL_OFFSET};
use crate::geometry::{displacement, Owner, PrimitiveTag};
use crate::morphology::{SynapseContact, SynapseSet, SynapseType};

/// Local radius relative to the sample radius at the contact segment.
pub const SYNAPSE_RADIUS_RATIO: f32 = 0.2;
/// Local radius when the contact's section or segment does not resolve.
pub const DEFAULT_SYNAPSE_RADIUS: f32 = 0.1;

const SPINE_LARGE_RATIO: f32 = 0.9;
const SPINE_SMALL_RATIO: f32 = 0.15;
const SPINE_BASE_RATIO: f32 = 0.25;
const SPINE_DISPLACEMENT_RATIO: f32 = 5.0;

impl Synthesizer<'_> {
    pub(super) fn add_synapses(&mut self, set: &SynapseSet) {
        let inverse = self.morphology.transform().inverse();
        for contact in set.iter() {
            self.add_spine(contact, &inverse);
        }
        log::debug!(
            "morphology {}: {} spines, {} on soma skipped, {} with fallback radius",
            self.morphology.id,
            self.summary.synapses.spines,
            self.summary.synapses.discarded_on_soma,
            self.summary.synapses.fallback_radius
        );
    }

    fn add_spine(&mut self, contact: &SynapseContact, inverse: &Affine3A) {
        let soma = self.morphology.soma();
        let soma_radius = self.corrected(soma.mean_radius);
        let origin = inverse.transform_point3(contact.origin);
        let target = inverse.transform_point3(contact.target);
        if target.distance(soma.centroid) <= soma_radius {
            self.summary.synapses.discarded_on_soma += 1;
            return;
        }

        let sample = self
            .morphology
            .section_by_id(contact.section_id)
            .and_then(|s| s.samples.get(contact.segment_id as usize));
        let radius = match sample {
            Some(s) => s.radius * SYNAPSE_RADIUS_RATIO,
            None => {
                log::debug!(
                    "synapse on section {} segment {} does not resolve, using default radius",
                    contact.section_id,
                    contact.segment_id
                );
                self.summary.synapses.fallback_radius += 1;
                DEFAULT_SYNAPSE_RADIUS
            }
        };

        let material_offset = match contact.synapse_type {
            SynapseType::Afferent => AFFERENT_SYNAPSE_MATERIAL_OFFSET,
            SynapseType::Efferent => EFFERENT_SYNAPSE_MATERIAL_OFFSET,
        };
        let tag = PrimitiveTag {
            material_id: self.derived_material(material_offset),
            user_data: None,
            owner: Owner::Group,
            group_id: self.groups.allocate(),
        };
        let sdf = self.config.sdf.synapses;
        let disp = displacement(SPINE_DISPLACEMENT_RATIO);
        let small = radius * SPINE_SMALL_RATIO;
        let base = radius * SPINE_BASE_RATIO;
        let surface = origin + (target - origin) * 0.5;

        let mut parts = vec![self.add_sphere(sdf, origin, radius * SPINE_LARGE_RATIO, tag, disp)];
        self.summary.bounds.merge(origin);

        if self.config.randomized_spines {
            let d = surface.distance(origin) / 5.0;
            let offset = Vec3::new(self.rng.random(), self.rng.random(), self.rng.random()) * d;
            let middle = (origin + surface) * 0.5 + offset;
            let middle_radius = small + d * 0.1 * self.rng.random::<f32>();

            parts.push(self.add_sphere(sdf, middle, middle_radius, tag, disp));
            if origin != middle {
                parts.push(self.add_segment(sdf, origin, small, middle, middle_radius, tag, disp));
            }
            if middle != surface {
                parts.push(self.add_segment(sdf, middle, middle_radius, surface, base, tag, disp));
            }
        } else if origin != surface {
            parts.push(self.add_segment(sdf, origin, small, surface, base, tag, disp));
        }

        if sdf {
            self.data.connect_all(&parts);
        }
        self.summary.synapses.spines += 1;
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{SdfSwitches, SynthesisConfig};
    use crate::geometry::{Owner, ShapeKind};
    use crate::morphology::{
        Morphology, MorphologyInput, Sample, Section, SectionType, Soma, SynapseContact, SynapseSet,
        SynapseType,
    };
    use crate::synth::{synthesize, AFFERENT_SYNAPSE_MATERIAL_OFFSET, EFFERENT_SYNAPSE_MATERIAL_OFFSET};
    use glam::{Affine3A, Vec3};

    fn dendrite() -> Morphology {
        let d = Section::new(1, SectionType::Dendrite, vec![
            Sample::new(0.0, 0.0, 0.0, 2.0),
            Sample::new(50.0, 0.0, 0.0, 2.0),
        ]);
        Morphology::new(21, Soma::new(Vec3::ZERO, 3.0), vec![d])
    }

    fn contact(synapse_type: SynapseType, section_id: u32, segment_id: u32) -> SynapseContact {
        SynapseContact {
            origin: Vec3::new(30.0, 4.0, 0.0),
            target: Vec3::new(30.0, 0.0, 0.0),
            section_id,
            segment_id,
            synapse_type,
        }
    }

    fn spine_parts(geometry: &crate::synth::MorphologyGeometry) -> Vec<usize> {
        geometry
            .primitives
            .iter()
            .enumerate()
            .filter(|(_, p)| p.owner == Owner::Group)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_randomized_spine() {
        let input = MorphologyInput::file(dendrite()).with_synapses(SynapseSet {
            afferent: vec![contact(SynapseType::Afferent, 1, 0)],
            efferent: Vec::new(),
        });
        let geometry = synthesize(&input, &SynthesisConfig::default().with_seed(4)).unwrap();
        let parts = spine_parts(&geometry);
        assert_eq!(parts.len(), 4);
        assert_eq!(geometry.summary.synapses.spines, 1);

        let head = &geometry.primitives[parts[0]];
        assert_eq!(head.kind(), ShapeKind::SdfSphere);
        assert_eq!(head.shape.endpoints().0, Vec3::new(30.0, 4.0, 0.0));
        // 0.9 of a local radius of 0.2 * 2
        assert!((head.shape.radii().0 - 0.36).abs() < 0.001);
        assert_eq!(head.material_id, AFFERENT_SYNAPSE_MATERIAL_OFFSET);
        assert_eq!(head.user_data, None);

        // The neck ends halfway to the center line
        let neck_end = geometry.primitives[parts[3]].shape.endpoints().1;
        assert_eq!(neck_end, Vec3::new(30.0, 2.0, 0.0));
        assert!((geometry.primitives[parts[3]].shape.radii().1 - 0.1).abs() < 0.003);

        // One group for the whole spine, blended together
        let group = head.group_id;
        for &i in &parts {
            assert_eq!(geometry.primitives[i].group_id, group);
            for &j in &parts {
                if i != j {
                    assert!(geometry.neighbours[i].contains(&j));
                }
            }
        }
    }

    #[test]
    fn test_plain_spine() {
        let input = MorphologyInput::file(dendrite()).with_synapses(SynapseSet {
            afferent: Vec::new(),
            efferent: vec![contact(SynapseType::Efferent, 1, 1)],
        });
        let config = SynthesisConfig::default()
            .with_randomized_spines(false)
            .with_sdf(SdfSwitches { synapses: false, ..SdfSwitches::all() });
        let geometry = synthesize(&input, &config).unwrap();
        let parts = spine_parts(&geometry);
        assert_eq!(parts.len(), 2);
        assert_eq!(geometry.primitives[parts[0]].kind(), ShapeKind::Sphere);
        assert_eq!(geometry.primitives[parts[1]].kind(), ShapeKind::Cone);
        assert_eq!(geometry.primitives[parts[0]].material_id, EFFERENT_SYNAPSE_MATERIAL_OFFSET);
        assert!(parts.iter().all(|&i| geometry.neighbours[i].is_empty()));
    }

    #[test]
    fn test_unresolved_segment_uses_default_radius() {
        let input = MorphologyInput::file(dendrite()).with_synapses(SynapseSet {
            afferent: vec![contact(SynapseType::Afferent, 1, 99), contact(SynapseType::Afferent, 8, 0)],
            efferent: Vec::new(),
        });
        let config = SynthesisConfig::default().with_randomized_spines(false);
        let geometry = synthesize(&input, &config).unwrap();
        assert_eq!(geometry.summary.synapses.fallback_radius, 2);
        assert_eq!(geometry.summary.synapses.spines, 2);
        let head = geometry
            .primitives
            .iter()
            .find(|p| p.owner == Owner::Group)
            .unwrap();
        assert!((head.shape.radii().0 - 0.09).abs() < 0.001);
    }

    #[test]
    fn test_contacts_are_moved_into_local_frame() {
        let shift = Vec3::new(0.0, 0.0, 500.0);
        let morphology = dendrite().with_transform(Affine3A::from_translation(shift));
        let mut c = contact(SynapseType::Afferent, 1, 0);
        c.origin += shift;
        c.target += shift;
        let input = MorphologyInput::file(morphology)
            .with_synapses(SynapseSet { afferent: vec![c], efferent: Vec::new() });
        let config = SynthesisConfig::default().with_randomized_spines(false);
        let geometry = synthesize(&input, &config).unwrap();
        assert_eq!(geometry.summary.synapses.spines, 1);
        // Back in world space after finalize
        let head = geometry.primitives.iter().find(|p| p.owner == Owner::Group).unwrap();
        assert_eq!(head.shape.endpoints().0, c.origin);
    }

    #[test]
    fn test_world_contact_on_soma_is_discarded() {
        let shift = Vec3::new(100.0, 0.0, 0.0);
        let morphology = dendrite().with_transform(Affine3A::from_translation(shift));
        let on_soma = SynapseContact {
            origin: shift + Vec3::new(0.0, 4.0, 0.0),
            target: shift + Vec3::new(0.0, 1.0, 0.0),
            section_id: 1,
            segment_id: 0,
            synapse_type: SynapseType::Efferent,
        };
        let input = MorphologyInput::file(morphology)
            .with_synapses(SynapseSet { afferent: Vec::new(), efferent: vec![on_soma] });
        let geometry = synthesize(&input, &SynthesisConfig::default()).unwrap();
        assert!(spine_parts(&geometry).is_empty());
        assert_eq!(geometry.summary.synapses.discarded_on_soma, 1);
    }
}
