//! Soma geometry: SDF connector clique or a parametric sphere with cones
//! towards each attached section.

use super::Synthesizer;
use crate::geometry::{Owner, Primitive, PrimitiveTag, Shape};
use crate::morphology::tree::is_active;
use crate::morphology::SectionType;

/// Displacement of the sigmoid soma connectors.
const SOMA_CONNECTOR_DISPLACEMENT: [f32; 3] = [0.2, 1.75, 2.0];

impl Synthesizer<'_> {
    pub(super) fn add_soma(&mut self) {
        let morphology = self.morphology;
        let soma = morphology.soma();
        let center = soma.centroid;
        let soma_radius = self.corrected(soma.mean_radius);
        self.summary.bounds.merge(center);

        let children: Vec<_> = soma
            .children
            .iter()
            .filter_map(|&id| morphology.section_by_id(id))
            .filter(|s| is_active(s, &self.config.section_types))
            .filter_map(|s| s.first())
            .collect();

        let tag = PrimitiveTag {
            material_id: self.config.material_for(SectionType::Soma),
            user_data: self.soma_user_data(),
            owner: Owner::Group,
            group_id: if self.config.sdf.soma { self.groups.allocate() } else { 0 },
        };

        if self.config.sdf.soma {
            let mut connectors = Vec::with_capacity(children.len());
            for first in children {
                self.summary.bounds.merge(first.position);
                let shape = Shape::SdfConePillSigmoid {
                    p0: center,
                    p1: first.position,
                    r0: soma_radius,
                    r1: self.corrected(first.radius),
                    displacement: SOMA_CONNECTOR_DISPLACEMENT,
                };
                connectors.push(self.data.push(Primitive::new(shape, tag)));
            }
            self.data.connect_all(&connectors);
        } else {
            self.data.push(Primitive::new(Shape::Sphere { center, radius: soma_radius }, tag));
            for first in children {
                self.summary.bounds.merge(first.position);
                let shape = Shape::Cone {
                    p0: center,
                    p1: first.position,
                    r0: soma_radius,
                    r1: self.corrected(first.radius),
                };
                self.data.push(Primitive::new(shape, tag));
            }
        }

        self.add_soma_internals();
    }

    /// The whole morphology as one sphere at the soma centroid.
    pub(super) fn add_point_soma(&mut self) {
        let center = self.morphology.soma().centroid;
        self.summary.bounds.merge(center);
        let tag = PrimitiveTag {
            material_id: self.config.material_for(SectionType::Soma),
            user_data: self.soma_user_data(),
            owner: Owner::Group,
            group_id: self.groups.allocate(),
        };
        let radius = self.config.radius.multiplier;
        self.add_sphere(
            self.config.sdf.soma,
            center,
            radius,
            tag,
            crate::geometry::displacement(1.0),
        );
    }
}
