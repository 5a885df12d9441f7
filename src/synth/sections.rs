//! Spheres and segments along each section, in traversal order.

use super::Synthesizer;
use crate::config::UserDataType;
use crate::geometry::math::cone_volume;
use crate::geometry::{displacement, Owner, PrimitiveTag};
use crate::morphology::tree::MorphologyTreeStructure;
use crate::morphology::{CompartmentReport, Section, SectionType};

/// Segments shorter than this are never damped.
const DAMPING_MIN_SEGMENT: f32 = 1e-4;
/// Largest radius change per unit of segment length under damping.
const DAMPING_RATE: f32 = 0.1;
const BRANCH_DISPLACEMENT_RATIO: f32 = 1.0;

/// What one section contributed, used to size its organelle budget.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct SectionStats {
    pub length: f32,
    pub volume: f32,
}

impl Synthesizer<'_> {
    pub(super) fn add_sections(&mut self, tree: &MorphologyTreeStructure) {
        let morphology = self.morphology;
        let sections = morphology.sections();
        let group_offset = self.groups.reserve(sections.len());
        let last_axon = self.last_reported_axon();
        let internals = self.config.generate_internals && self.config.organelle_density > 0.0;

        for &index in &tree.traversal_order {
            let section = &sections[index];
            let stats = self.add_section(index, section, group_offset + index as u32, last_axon);
            if internals && section.section_type == SectionType::Axon {
                self.add_section_mitochondria(section, stats);
            }
        }
    }

    /// Id of the last axon section with reported compartments. Only the
    /// first few axon sections are usually reported.
    fn last_reported_axon(&self) -> u32 {
        let Some(report) = self.report else { return 0 };
        if !self.config.section_types.axon {
            return 0;
        }
        let mut last = 0;
        for section in self.morphology.sections() {
            if section.section_type != SectionType::Axon {
                continue;
            }
            match report.count(section.id) {
                Some(count) if count > 0 => last = section.id,
                _ => break,
            }
        }
        last
    }

    fn add_section(&mut self, index: usize, section: &Section, group_id: u32, last_axon: u32) -> SectionStats {
        let config = self.config;
        let morphology = self.morphology;
        let samples = &section.samples;
        let n = samples.len();
        let mut stats = SectionStats::default();
        self.data.begin_section(index);
        if n == 0 {
            log::debug!("section {} of morphology {} has no samples", section.id, morphology.id);
            return stats;
        }

        let stride = config.quality.stride(n);
        let sdf = config.sdf.branches;
        let material_id = config.material_for(section.section_type);
        let ancestors = morphology.ancestors_length(index);
        let mut prefix = Vec::with_capacity(n);
        let mut acc = 0.0;
        for (i, s) in samples.iter().enumerate() {
            if i > 0 {
                acc += samples[i - 1].position.distance(s.position);
            }
            prefix.push(acc);
        }

        let parent_last = morphology
            .parent_of(index)
            .and_then(|p| morphology.sections()[p].last());
        let mut prev_radius = self.corrected(parent_last.unwrap_or(&samples[0]).radius);
        let mut previous = samples[0];

        let mut s = stride;
        loop {
            let done = s >= n - 1;
            if done {
                s = n - 1;
            }
            let sample = samples[s];
            let distance = ancestors + prefix[s];

            if distance <= config.max_distance_to_soma {
                self.summary.max_distance_to_soma = self.summary.max_distance_to_soma.max(distance);
                let user_data = match config.user_data {
                    UserDataType::Undefined => None,
                    UserDataType::DistanceToSoma => Some((distance * 10.0) as u64),
                    UserDataType::SimulationOffset => self
                        .report
                        .map(|r| simulation_offset(r, section, s, stride, last_axon)),
                };

                let position = previous.position;
                let target = sample.position;
                self.summary.bounds.merge(position);
                self.summary.bounds.merge(target);

                let segment_length = position.distance(target);
                let mut radius = self.corrected(sample.radius);
                if config.dampen_thickness && segment_length > DAMPING_MIN_SEGMENT && s != n - 1 {
                    let max_step = DAMPING_RATE * segment_length;
                    let delta = radius - prev_radius;
                    if delta.abs() > max_step {
                        radius = prev_radius + max_step.copysign(delta);
                    }
                }

                if radius > 0.0 {
                    let tag = PrimitiveTag {
                        material_id,
                        user_data,
                        owner: Owner::Section(index),
                        group_id,
                    };
                    let disp = displacement(BRANCH_DISPLACEMENT_RATIO);
                    if done {
                        let bif = self.add_sphere(sdf, target, radius, tag, disp);
                        if sdf {
                            self.data.set_bifurcation(index, bif);
                        }
                    }
                    if position != target && prev_radius > 0.0 {
                        self.add_segment(sdf, position, prev_radius, target, radius, tag, disp);
                        stats.volume += cone_volume(segment_length, prev_radius, radius);
                    }
                }

                stats.length += segment_length;
                previous = sample;
                prev_radius = radius;
            }

            if done {
                break;
            }
            s += stride;
        }
        stats
    }
}

/// Report offset of sample `s` of a section.
fn simulation_offset(report: &CompartmentReport, section: &Section, s: usize, stride: usize, last_axon: u32) -> u64 {
    match report.count(section.id) {
        Some(count) if count > 0 => {
            let base = report.offset(section.id).unwrap_or_else(|| report.soma_offset());
            let per_sample = f64::from(count) / section.samples.len() as f64;
            base + (s.saturating_sub(stride) as f64 * per_sample) as u64
        }
        Some(_) if section.section_type == SectionType::Axon => {
            report.offset(last_axon).unwrap_or_else(|| report.soma_offset())
        }
        Some(_) => u64::MAX,
        None => report.soma_offset(),
    }
}
