//! In-memory map container.
//!
//! [`MemoryContainer`] implements the full container boundary
//! ([`LoadInfo`], [`FeatureSource`] and [`MetadataDeserializer`]) over
//! plain vectors, fed feature by feature through
//! [`MemoryContainerBuilder`]. The integration tests run the whole
//! read pipeline against it; embedders can use it as a fixture
//! container.

use std::ops::ControlFlow;

use crate::coord::RectD;
use crate::feature::{DecodeError, FeatureBuilder, GeometryCodingParams, MetaField, Metadata};

use super::{Classificator, FeatureId, FeatureSource, LoadInfo, MetadataDeserializer};

/// A catalogue that resolves index `i` to type `i + 1` for all known
/// indices.
///
/// Type zero stays reserved as "no type", matching the convention that a
/// resolvable index never maps to zero.
#[derive(Debug, Clone)]
pub struct IdentityClassificator {
    known_count: u32,
    stub: u32,
}

impl IdentityClassificator {
    /// A catalogue knowing `known_count` indices, with the given stub
    /// type for everything beyond.
    pub fn new(known_count: u32, stub: u32) -> Self {
        Self { known_count, stub }
    }
}

impl Default for IdentityClassificator {
    fn default() -> Self {
        Self::new(1 << 16, u32::MAX)
    }
}

impl Classificator for IdentityClassificator {
    fn type_for_index(&self, index: u32) -> Option<u32> {
        (index < self.known_count).then_some(index + 1)
    }

    fn stub_type(&self) -> u32 {
        self.stub
    }
}

struct FeatureEntry {
    record: Vec<u8>,
    limit_rect: RectD,
    meta_ids: Vec<(MetaField, u32)>,
}

/// Assembles a [`MemoryContainer`].
pub struct MemoryContainerBuilder {
    coding_params: GeometryCodingParams,
    scales: Vec<i32>,
    geometry_streams: Vec<Vec<u8>>,
    triangle_streams: Vec<Vec<u8>>,
    features: Vec<FeatureEntry>,
    meta_records: Vec<String>,
}

impl MemoryContainerBuilder {
    /// Start a container with the given per-scale table.
    ///
    /// The outer-geometry mask is four bits wide, so at most four scale
    /// levels are supported.
    pub fn new(coding_params: GeometryCodingParams, scales: Vec<i32>) -> Self {
        assert!(
            !scales.is_empty() && scales.len() <= 4,
            "a container stores 1..=4 geometry scale levels"
        );
        assert!(scales.windows(2).all(|w| w[0] < w[1]), "scales must ascend");

        let count = scales.len();
        Self {
            coding_params,
            scales,
            geometry_streams: vec![Vec::new(); count],
            triangle_streams: vec![Vec::new(); count],
            features: Vec::new(),
            meta_records: Vec::new(),
        }
    }

    /// Serialise a feature into the container. Returns its id.
    pub fn add(&mut self, feature: &FeatureBuilder) -> FeatureId {
        let built = feature.serialize(
            &self.coding_params,
            self.scales.len(),
            &mut self.geometry_streams,
            &mut self.triangle_streams,
        );

        let mut meta_ids = Vec::new();
        for (field, value) in feature.metadata().iter() {
            let id = self.meta_records.len() as u32;
            self.meta_records.push(value.to_string());
            meta_ids.push((field, id));
        }

        let id = FeatureId(self.features.len() as u32);
        self.features.push(FeatureEntry {
            record: built.record,
            limit_rect: built.limit_rect,
            meta_ids,
        });
        id
    }

    /// Freeze into a shareable container.
    pub fn finish(self) -> MemoryContainer {
        MemoryContainer {
            coding_params: self.coding_params,
            scales: self.scales,
            geometry_streams: self.geometry_streams,
            triangle_streams: self.triangle_streams,
            features: self.features,
            meta_records: self.meta_records,
        }
    }
}

/// A frozen in-memory container.
pub struct MemoryContainer {
    coding_params: GeometryCodingParams,
    scales: Vec<i32>,
    geometry_streams: Vec<Vec<u8>>,
    triangle_streams: Vec<Vec<u8>>,
    features: Vec<FeatureEntry>,
    meta_records: Vec<String>,
}

impl MemoryContainer {
    /// Number of features stored.
    pub fn features_count(&self) -> usize {
        self.features.len()
    }

    /// Raw record bytes of one feature.
    pub fn record(&self, id: FeatureId) -> Option<&[u8]> {
        self.features.get(id.0 as usize).map(|f| f.record.as_slice())
    }
}

impl LoadInfo for MemoryContainer {
    fn default_coding_params(&self) -> GeometryCodingParams {
        self.coding_params
    }

    fn scales_count(&self) -> usize {
        self.scales.len()
    }

    fn scale(&self, index: usize) -> i32 {
        self.scales[index]
    }

    fn geometry_bytes(&self, scale_index: usize) -> Result<&[u8], DecodeError> {
        self.geometry_streams
            .get(scale_index)
            .map(Vec::as_slice)
            .ok_or(DecodeError::MissingStream { index: scale_index })
    }

    fn triangle_bytes(&self, scale_index: usize) -> Result<&[u8], DecodeError> {
        self.triangle_streams
            .get(scale_index)
            .map(Vec::as_slice)
            .ok_or(DecodeError::MissingStream { index: scale_index })
    }
}

impl FeatureSource for MemoryContainer {
    fn for_each(
        &self,
        rect: &RectD,
        _scale: i32,
        f: &mut dyn FnMut(FeatureId, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), DecodeError> {
        // A linear scan stands in for the container's spatial section;
        // scale-based visibility filtering is the production index's
        // concern.
        for (i, entry) in self.features.iter().enumerate() {
            if entry.limit_rect.intersects(rect) {
                if let ControlFlow::Break(()) = f(FeatureId(i as u32), &entry.record) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl MetadataDeserializer for MemoryContainer {
    fn metadata(&self, feature: FeatureId) -> Result<Metadata, DecodeError> {
        let entry = self
            .features
            .get(feature.0 as usize)
            .ok_or_else(|| DecodeError::Metadata(format!("unknown feature {feature}")))?;

        let mut meta = Metadata::new();
        for &(field, id) in &entry.meta_ids {
            meta.set(field, self.meta_by_id(id)?);
        }
        Ok(meta)
    }

    fn meta_ids(&self, feature: FeatureId) -> Result<Vec<(MetaField, u32)>, DecodeError> {
        self.features
            .get(feature.0 as usize)
            .map(|f| f.meta_ids.clone())
            .ok_or_else(|| DecodeError::Metadata(format!("unknown feature {feature}")))
    }

    fn meta_by_id(&self, id: u32) -> Result<String, DecodeError> {
        self.meta_records
            .get(id as usize)
            .cloned()
            .ok_or_else(|| DecodeError::Metadata(format!("unknown metadata record {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::PointD;

    fn build_container() -> MemoryContainer {
        let mut builder =
            MemoryContainerBuilder::new(GeometryCodingParams::default(), vec![6, 10, 14, 17]);
        builder.add(
            &FeatureBuilder::new()
                .add_type(3)
                .point(PointD::new(10.0, 10.0)),
        );
        builder.add(
            &FeatureBuilder::new()
                .add_type(5)
                .with_metadata(MetaField::Phone, "+1 555 0100")
                .point(PointD::new(50.0, 50.0)),
        );
        builder.finish()
    }

    #[test]
    fn test_for_each_filters_by_rect() {
        let container = build_container();

        let mut seen = Vec::new();
        container
            .for_each(&RectD::new(0.0, 0.0, 20.0, 20.0), 10, &mut |id, _| {
                seen.push(id);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen, vec![FeatureId(0)]);

        seen.clear();
        container
            .for_each(&RectD::new(-180.0, -180.0, 180.0, 180.0), 10, &mut |id, _| {
                seen.push(id);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_for_each_break_stops_iteration() {
        let container = build_container();

        let mut seen = 0;
        container
            .for_each(&RectD::new(-180.0, -180.0, 180.0, 180.0), 10, &mut |_, _| {
                seen += 1;
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_metadata_round_trip() {
        let container = build_container();

        let meta = container.metadata(FeatureId(1)).unwrap();
        assert_eq!(meta.get(MetaField::Phone), Some("+1 555 0100"));

        let ids = container.meta_ids(FeatureId(1)).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(container.meta_by_id(ids[0].1).unwrap(), "+1 555 0100");

        assert!(container.metadata(FeatureId(0)).unwrap().is_empty());
    }

    #[test]
    fn test_identity_classificator() {
        let c = IdentityClassificator::new(10, 999);
        assert_eq!(c.type_for_index(0), Some(1));
        assert_eq!(c.type_for_index(9), Some(10));
        assert_eq!(c.type_for_index(10), None);
        assert_eq!(c.stub_type(), 999);
    }

    #[test]
    #[should_panic(expected = "1..=4 geometry scale levels")]
    fn test_too_many_scales_rejected() {
        MemoryContainerBuilder::new(GeometryCodingParams::default(), vec![1, 2, 3, 4, 5]);
    }
}
