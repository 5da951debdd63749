//! Attribute descriptors, the descriptor registry and typed attribute maps
//!
//! Attribute identity is semantic: a map is bound under an
//! [`AttributeKey`] (`name` + `usage_index`) whose [`AttributeDescriptor`]
//! says how values are interpolated and transformed. Operators use that to
//! carry every bound attribute through a topology change without naming
//! any of them.
//!
//! Values are limited to a closed set of vector types
//! ([`AttributeValues`]); generic code dispatches over that enum instead of
//! copying untyped bytes.

use crate::error::{MeshError, Result};
use crate::mesh::property_map::PropertyMap;
use crate::mesh::types::{EntityId, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Well-known attribute names
pub mod names {
    pub const POSITION: &str = "position";
    pub const NORMAL: &str = "normal";
    pub const NORMAL_SMOOTH: &str = "normal_smooth";
    pub const TANGENT: &str = "tangent";
    pub const BITANGENT: &str = "bitangent";
    pub const TEXCOORD: &str = "texcoord";
    pub const COLOR: &str = "color";
    pub const CENTROID: &str = "centroid";
    pub const JOINT_INDICES: &str = "joint_indices";
    pub const JOINT_WEIGHTS: &str = "joint_weights";
}

/// Supported attribute value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Vec2,
    Vec3,
    Vec4,
    UVec2,
    UVec3,
    UVec4,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Vec4 => "vec4",
            ValueType::UVec2 => "uvec2",
            ValueType::UVec3 => "uvec3",
            ValueType::UVec4 => "uvec4",
        };
        f.write_str(name)
    }
}

/// How values are combined when an entity is derived from several sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// The attribute is not carried to derived meshes
    None,
    /// Weighted sum
    Linear,
    /// Weighted sum, then normalized (direction vectors)
    Normalized,
    /// Weighted sum, xyz normalized, w kept (tangent + handedness)
    NormalizedVec3Float,
}

/// How values respond to a mesh transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformMode {
    /// Values are not affected by transforms
    None,
    /// Transformed as positions (w = 1)
    Matrix,
    /// Transformed by the inverse transpose as directions (w = 0) and normalized
    NormalizeInverseTranspose,
    /// Like `NormalizeInverseTranspose` for xyz, w passed through
    NormalizeInverseTransposeVec3Float,
}

/// Semantic identity of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeKey {
    pub usage_index: u32,
    pub name: String,
}

impl AttributeKey {
    pub fn new(name: impl Into<String>, usage_index: u32) -> Self {
        Self {
            usage_index,
            name: name.into(),
        }
    }

    /// Key with usage index 0
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, 0)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.usage_index)
    }
}

/// Full description of an attribute: identity, storage type and behavior
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub key: AttributeKey,
    pub value_type: ValueType,
    pub interpolation_mode: InterpolationMode,
    pub transform_mode: TransformMode,
}

impl AttributeDescriptor {
    pub fn new(
        key: AttributeKey,
        value_type: ValueType,
        interpolation_mode: InterpolationMode,
        transform_mode: TransformMode,
    ) -> Self {
        Self {
            key,
            value_type,
            interpolation_mode,
            transform_mode,
        }
    }
}

/// Registry of attribute descriptors keyed by `(usage_index, name)`
///
/// Build it once (usually with [`AttributeRegistry::standard`]), register
/// any custom descriptors, then share it behind an `Arc`. Every mesh keeps a
/// handle to the registry it was created with.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    descriptors: HashMap<AttributeKey, AttributeDescriptor>,
}

impl AttributeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every well-known descriptor
    pub fn standard() -> Self {
        use InterpolationMode as I;
        use TransformMode as T;
        use ValueType as V;

        let mut registry = Self::new();
        let entries = [
            (names::POSITION, V::Vec3, I::Linear, T::Matrix),
            (names::NORMAL, V::Vec3, I::Normalized, T::NormalizeInverseTranspose),
            (names::NORMAL_SMOOTH, V::Vec3, I::Normalized, T::NormalizeInverseTranspose),
            (
                names::TANGENT,
                V::Vec4,
                I::NormalizedVec3Float,
                T::NormalizeInverseTransposeVec3Float,
            ),
            (
                names::BITANGENT,
                V::Vec4,
                I::NormalizedVec3Float,
                T::NormalizeInverseTransposeVec3Float,
            ),
            (names::TEXCOORD, V::Vec2, I::Linear, T::None),
            (names::COLOR, V::Vec4, I::Linear, T::None),
            (names::CENTROID, V::Vec3, I::Linear, T::Matrix),
            (names::JOINT_INDICES, V::UVec4, I::Linear, T::None),
            (names::JOINT_WEIGHTS, V::Vec4, I::Linear, T::None),
        ];
        for (name, value_type, interpolation_mode, transform_mode) in entries {
            registry.descriptors.insert(
                AttributeKey::named(name),
                AttributeDescriptor::new(
                    AttributeKey::named(name),
                    value_type,
                    interpolation_mode,
                    transform_mode,
                ),
            );
        }
        registry
    }

    /// Register a descriptor
    ///
    /// Re-registering an identical descriptor is accepted; registering a
    /// different descriptor under an existing key is an error.
    pub fn register(&mut self, descriptor: AttributeDescriptor) -> Result<()> {
        if let Some(existing) = self.descriptors.get(&descriptor.key) {
            if *existing == descriptor {
                return Ok(());
            }
            return Err(MeshError::AttributeTypeMismatch {
                name: descriptor.key.to_string(),
                expected: existing.value_type.to_string(),
                found: descriptor.value_type.to_string(),
            });
        }
        self.descriptors.insert(descriptor.key.clone(), descriptor);
        Ok(())
    }

    /// Look up a descriptor
    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeDescriptor> {
        self.descriptors.get(key)
    }

    /// Look up a descriptor, failing with [`MeshError::MissingAttribute`]
    pub fn require(&self, key: &AttributeKey) -> Result<&AttributeDescriptor> {
        self.get(key).ok_or_else(|| {
            MeshError::MissingAttribute(format!("no descriptor registered for {}", key))
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// A value type that can be stored in an attribute map
pub trait AttributeValue: Copy + Default + PartialEq + fmt::Debug + 'static {
    /// Storage type tag
    const VALUE_TYPE: ValueType;

    /// Combine contributions whose weights already sum to one
    fn blend(contributions: &[(f32, Self)]) -> Self;

    /// Post-process a blended value according to the interpolation mode
    fn finish_interpolation(self, _mode: InterpolationMode) -> Self {
        self
    }

    /// Apply a transform according to the transform mode
    fn transform(self, mode: TransformMode, matrix: &Mat4, inverse_transpose: &Mat4) -> Self;

    /// Flip a direction-like value (used when polygon winding is reversed)
    fn negate(self) -> Self;

    /// Wrap a typed map into the closed enum
    fn into_values<K: EntityId>(map: PropertyMap<K, Self>) -> AttributeValues<K>;

    /// Typed view of an enum value, if it stores this type
    fn as_map<K: EntityId>(values: &AttributeValues<K>) -> Option<&PropertyMap<K, Self>>;

    /// Mutable typed view of an enum value, if it stores this type
    fn as_map_mut<K: EntityId>(
        values: &mut AttributeValues<K>,
    ) -> Option<&mut PropertyMap<K, Self>>;
}

fn normalize_or_keep(v: Vec3) -> Vec3 {
    v.try_normalize(f32::EPSILON).unwrap_or(v)
}

fn apply_direction(matrix: &Mat4, v: Vec3) -> Vec3 {
    normalize_or_keep((matrix * v.push(0.0)).xyz())
}

macro_rules! impl_enum_access {
    ($variant:ident) => {
        fn into_values<K: EntityId>(map: PropertyMap<K, Self>) -> AttributeValues<K> {
            AttributeValues::$variant(map)
        }

        fn as_map<K: EntityId>(values: &AttributeValues<K>) -> Option<&PropertyMap<K, Self>> {
            match values {
                AttributeValues::$variant(map) => Some(map),
                _ => None,
            }
        }

        fn as_map_mut<K: EntityId>(
            values: &mut AttributeValues<K>,
        ) -> Option<&mut PropertyMap<K, Self>> {
            match values {
                AttributeValues::$variant(map) => Some(map),
                _ => None,
            }
        }
    };
}

macro_rules! impl_float_blend {
    () => {
        fn blend(contributions: &[(f32, Self)]) -> Self {
            contributions
                .iter()
                .fold(Self::zeros(), |sum, (weight, value)| sum + value * *weight)
        }
    };
}

impl AttributeValue for Vec2 {
    const VALUE_TYPE: ValueType = ValueType::Vec2;

    impl_float_blend!();

    fn transform(self, mode: TransformMode, matrix: &Mat4, _inverse_transpose: &Mat4) -> Self {
        match mode {
            TransformMode::Matrix => (matrix * Vec4::new(self.x, self.y, 0.0, 1.0)).xy(),
            _ => self,
        }
    }

    fn negate(self) -> Self {
        self
    }

    impl_enum_access!(Vec2);
}

impl AttributeValue for Vec3 {
    const VALUE_TYPE: ValueType = ValueType::Vec3;

    impl_float_blend!();

    fn finish_interpolation(self, mode: InterpolationMode) -> Self {
        match mode {
            InterpolationMode::Normalized => normalize_or_keep(self),
            _ => self,
        }
    }

    fn transform(self, mode: TransformMode, matrix: &Mat4, inverse_transpose: &Mat4) -> Self {
        match mode {
            TransformMode::None => self,
            TransformMode::Matrix => (matrix * self.push(1.0)).xyz(),
            TransformMode::NormalizeInverseTranspose
            | TransformMode::NormalizeInverseTransposeVec3Float => {
                apply_direction(inverse_transpose, self)
            }
        }
    }

    fn negate(self) -> Self {
        -self
    }

    impl_enum_access!(Vec3);
}

impl AttributeValue for Vec4 {
    const VALUE_TYPE: ValueType = ValueType::Vec4;

    impl_float_blend!();

    fn finish_interpolation(self, mode: InterpolationMode) -> Self {
        match mode {
            InterpolationMode::NormalizedVec3Float => normalize_or_keep(self.xyz()).push(self.w),
            _ => self,
        }
    }

    fn transform(self, mode: TransformMode, matrix: &Mat4, inverse_transpose: &Mat4) -> Self {
        match mode {
            TransformMode::None => self,
            TransformMode::Matrix => matrix * self,
            TransformMode::NormalizeInverseTranspose => {
                let v = inverse_transpose * self;
                v.try_normalize(f32::EPSILON).unwrap_or(v)
            }
            TransformMode::NormalizeInverseTransposeVec3Float => {
                apply_direction(inverse_transpose, self.xyz()).push(self.w)
            }
        }
    }

    fn negate(self) -> Self {
        (-self.xyz()).push(self.w)
    }

    impl_enum_access!(Vec4);
}

macro_rules! impl_unsigned_value {
    ($value:ty, $variant:ident) => {
        impl AttributeValue for $value {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            /// Indices are never blended; the strongest contributor wins.
            fn blend(contributions: &[(f32, Self)]) -> Self {
                contributions
                    .iter()
                    .fold(None::<(f32, Self)>, |best, &(weight, value)| match best {
                        Some((best_weight, _)) if best_weight >= weight => best,
                        _ => Some((weight, value)),
                    })
                    .map(|(_, value)| value)
                    .unwrap_or_default()
            }

            fn transform(self, _mode: TransformMode, _matrix: &Mat4, _it: &Mat4) -> Self {
                self
            }

            fn negate(self) -> Self {
                self
            }

            impl_enum_access!($variant);
        }
    };
}

impl_unsigned_value!(UVec2, UVec2);
impl_unsigned_value!(UVec3, UVec3);
impl_unsigned_value!(UVec4, UVec4);

/// Attribute storage for one map, closed over the supported value types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValues<K> {
    Vec2(PropertyMap<K, Vec2>),
    Vec3(PropertyMap<K, Vec3>),
    Vec4(PropertyMap<K, Vec4>),
    UVec2(PropertyMap<K, UVec2>),
    UVec3(PropertyMap<K, UVec3>),
    UVec4(PropertyMap<K, UVec4>),
}

macro_rules! dispatch {
    ($values:expr, $map:ident => $body:expr) => {
        match $values {
            AttributeValues::Vec2($map) => $body,
            AttributeValues::Vec3($map) => $body,
            AttributeValues::Vec4($map) => $body,
            AttributeValues::UVec2($map) => $body,
            AttributeValues::UVec3($map) => $body,
            AttributeValues::UVec4($map) => $body,
        }
    };
}

macro_rules! dispatch_rewrap {
    ($values:expr, $map:ident => $body:expr) => {
        match $values {
            AttributeValues::Vec2($map) => AttributeValues::Vec2($body),
            AttributeValues::Vec3($map) => AttributeValues::Vec3($body),
            AttributeValues::Vec4($map) => AttributeValues::Vec4($body),
            AttributeValues::UVec2($map) => AttributeValues::UVec2($body),
            AttributeValues::UVec3($map) => AttributeValues::UVec3($body),
            AttributeValues::UVec4($map) => AttributeValues::UVec4($body),
        }
    };
}

impl<K: EntityId> AttributeValues<K> {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::UVec2(_) => ValueType::UVec2,
            Self::UVec3(_) => ValueType::UVec3,
            Self::UVec4(_) => ValueType::UVec4,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, map => map.len())
    }

    pub fn is_empty(&self) -> bool {
        dispatch!(self, map => map.is_empty())
    }

    pub fn has(&self, key: K) -> bool {
        dispatch!(self, map => map.has(key))
    }

    pub fn present_count(&self) -> usize {
        dispatch!(self, map => map.present_count())
    }

    pub fn resize(&mut self, len: usize) {
        dispatch!(self, map => map.resize(len))
    }

    pub fn remap_keys(&mut self, old_from_new: &[K]) {
        dispatch!(self, map => map.remap_keys(old_from_new))
    }

    pub fn trim(&mut self, len: usize) {
        dispatch!(self, map => map.trim(len))
    }

    /// Copy the value of `from` into `to` (absent stays absent)
    pub fn copy_value(&mut self, from: K, to: K) {
        dispatch!(self, map => match map.try_get(from) {
            Some(value) => map.put(to, value),
            None => map.erase(to),
        })
    }

    /// Derive destination storage from recorded `(weight, source)` lists
    pub fn interpolate(&self, sources: &[Vec<(f32, K)>], mode: InterpolationMode) -> Self {
        dispatch_rewrap!(self, map => interpolate_map(map, sources, mode))
    }

    pub fn transform(&mut self, mode: TransformMode, matrix: &Mat4, inverse_transpose: &Mat4) {
        dispatch!(self, map => map.map_values(|v| v.transform(mode, matrix, inverse_transpose)))
    }

    pub fn negate(&mut self) {
        dispatch!(self, map => map.map_values(|v| v.negate()))
    }
}

/// Weight-normalized interpolation of one typed map
///
/// Entity `n` of the result is the sum of `weight / sum_of_weights * value`
/// over the contributions in `sources[n]` whose key holds a value. Entities
/// whose contributing weights sum to zero are left without a value.
pub fn interpolate_map<K: EntityId, V: AttributeValue>(
    source: &PropertyMap<K, V>,
    sources: &[Vec<(f32, K)>],
    mode: InterpolationMode,
) -> PropertyMap<K, V> {
    let mut destination = PropertyMap::with_len(sources.len());
    let mut weighted: Vec<(f32, V)> = Vec::new();
    for (new_index, contributions) in sources.iter().enumerate() {
        let sum_weights: f32 = contributions
            .iter()
            .filter(|(_, key)| source.has(*key))
            .map(|(weight, _)| *weight)
            .sum();
        if sum_weights == 0.0 {
            continue;
        }
        weighted.clear();
        weighted.extend(contributions.iter().filter_map(|&(weight, key)| {
            source.try_get(key).map(|v| (weight / sum_weights, v))
        }));
        let value = V::blend(&weighted).finish_interpolation(mode);
        destination.put(K::from_index(new_index), value);
    }
    destination
}

/// One bound attribute map
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMap<K> {
    pub descriptor: AttributeDescriptor,
    pub values: AttributeValues<K>,
}

/// All attribute maps bound to one entity kind (points, corners, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMaps<K> {
    maps: Vec<AttributeMap<K>>,
}

impl<K: EntityId> Default for AttributeMaps<K> {
    fn default() -> Self {
        Self { maps: Vec::new() }
    }
}

impl<K: EntityId> AttributeMaps<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeMap<K>> {
        self.maps.iter()
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.position_of(key).is_some()
    }

    fn position_of(&self, key: &AttributeKey) -> Option<usize> {
        self.maps.iter().position(|m| m.descriptor.key == *key)
    }

    /// Untyped access to a bound map
    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeMap<K>> {
        self.maps.iter().find(|m| m.descriptor.key == *key)
    }

    /// Typed access; `None` when absent or bound with another value type
    pub fn find<V: AttributeValue>(&self, key: &AttributeKey) -> Option<&PropertyMap<K, V>> {
        self.get(key).and_then(|m| V::as_map(&m.values))
    }

    pub fn find_mut<V: AttributeValue>(
        &mut self,
        key: &AttributeKey,
    ) -> Option<&mut PropertyMap<K, V>> {
        self.maps
            .iter_mut()
            .find(|m| m.descriptor.key == *key)
            .and_then(|m| V::as_map_mut(&mut m.values))
    }

    /// Bind (or fetch) the map described by `descriptor`
    ///
    /// Fails when `V` does not match the descriptor, or when a map with the
    /// same key is already bound with a different value type.
    pub fn create<V: AttributeValue>(
        &mut self,
        descriptor: &AttributeDescriptor,
    ) -> Result<&mut PropertyMap<K, V>> {
        if descriptor.value_type != V::VALUE_TYPE {
            return Err(MeshError::AttributeTypeMismatch {
                name: descriptor.key.to_string(),
                expected: descriptor.value_type.to_string(),
                found: V::VALUE_TYPE.to_string(),
            });
        }
        let index = match self.position_of(&descriptor.key) {
            Some(index) => index,
            None => {
                self.maps.push(AttributeMap {
                    descriptor: descriptor.clone(),
                    values: V::into_values(PropertyMap::new()),
                });
                self.maps.len() - 1
            }
        };
        let map = &mut self.maps[index];
        let found = map.values.value_type();
        V::as_map_mut(&mut map.values).ok_or_else(|| MeshError::AttributeTypeMismatch {
            name: descriptor.key.to_string(),
            expected: V::VALUE_TYPE.to_string(),
            found: found.to_string(),
        })
    }

    /// Bind an already built storage, replacing any map with the same key
    pub fn insert(&mut self, descriptor: AttributeDescriptor, values: AttributeValues<K>) {
        match self.position_of(&descriptor.key) {
            Some(index) => self.maps[index] = AttributeMap { descriptor, values },
            None => self.maps.push(AttributeMap { descriptor, values }),
        }
    }

    pub fn remove(&mut self, key: &AttributeKey) -> Option<AttributeMap<K>> {
        self.position_of(key).map(|index| self.maps.remove(index))
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }

    /// Interpolate every carried map into `destination`
    ///
    /// Maps whose interpolation mode is [`InterpolationMode::None`] are
    /// skipped.
    pub fn interpolate(&self, destination: &mut AttributeMaps<K>, sources: &[Vec<(f32, K)>]) {
        for map in &self.maps {
            let mode = map.descriptor.interpolation_mode;
            if mode == InterpolationMode::None {
                log::trace!("interpolation mode none, skipping {}", map.descriptor.key);
                continue;
            }
            let values = map.values.interpolate(sources, mode);
            log::trace!(
                "interpolated {} ({}): {} of {} entities",
                map.descriptor.key,
                map.descriptor.value_type,
                values.present_count(),
                sources.len()
            );
            destination.insert(map.descriptor.clone(), values);
        }
    }

    pub fn remap_keys(&mut self, old_from_new: &[K]) {
        for map in &mut self.maps {
            map.values.remap_keys(old_from_new);
        }
    }

    pub fn trim(&mut self, len: usize) {
        for map in &mut self.maps {
            map.values.trim(len);
        }
    }

    /// Copy every map's value of `from` into `to`
    pub fn copy_values(&mut self, from: K, to: K) {
        for map in &mut self.maps {
            map.values.copy_value(from, to);
        }
    }

    /// Apply each map's transform mode
    pub fn transform(&mut self, matrix: &Mat4, inverse_transpose: &Mat4) {
        for map in &mut self.maps {
            map.values
                .transform(map.descriptor.transform_mode, matrix, inverse_transpose);
        }
    }

    /// Negate every map that is transformed as a direction
    pub fn negate_directions(&mut self) {
        for map in &mut self.maps {
            match map.descriptor.transform_mode {
                TransformMode::NormalizeInverseTranspose
                | TransformMode::NormalizeInverseTransposeVec3Float => map.values.negate(),
                TransformMode::None | TransformMode::Matrix => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::PointId;
    use approx::assert_relative_eq;

    fn descriptor(name: &str) -> AttributeDescriptor {
        AttributeRegistry::standard()
            .get(&AttributeKey::named(name))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_standard_registry() {
        let registry = AttributeRegistry::standard();
        let position = registry.get(&AttributeKey::named(names::POSITION)).unwrap();
        assert_eq!(position.value_type, ValueType::Vec3);
        assert_eq!(position.transform_mode, TransformMode::Matrix);
        assert!(registry.get(&AttributeKey::new(names::TEXCOORD, 1)).is_none());
        assert!(registry.require(&AttributeKey::named("nope")).is_err());
    }

    #[test]
    fn test_register_conflict() {
        let mut registry = AttributeRegistry::standard();
        let same = descriptor(names::NORMAL);
        assert!(registry.register(same).is_ok());

        let conflicting = AttributeDescriptor::new(
            AttributeKey::named(names::NORMAL),
            ValueType::Vec4,
            InterpolationMode::Linear,
            TransformMode::None,
        );
        assert!(registry.register(conflicting).is_err());

        let custom = AttributeDescriptor::new(
            AttributeKey::new(names::TEXCOORD, 1),
            ValueType::Vec2,
            InterpolationMode::Linear,
            TransformMode::None,
        );
        assert!(registry.register(custom).is_ok());
        assert!(registry.get(&AttributeKey::new(names::TEXCOORD, 1)).is_some());
    }

    #[test]
    fn test_weight_normalized_interpolation() {
        let mut source: PropertyMap<PointId, Vec3> = PropertyMap::new();
        source.put(PointId(0), Vec3::new(0.0, 0.0, 0.0));
        source.put(PointId(1), Vec3::new(2.0, 4.0, 0.0));

        let sources = vec![
            vec![(1.0, PointId(0)), (1.0, PointId(1))],
            vec![(3.0, PointId(1))],
            vec![(1.0, PointId(0)), (5.0, PointId(7))],
            vec![(1.0, PointId(9))],
        ];
        let result = interpolate_map(&source, &sources, InterpolationMode::Linear);

        assert_eq!(result.len(), 4);
        assert_relative_eq!(result.get(PointId(0)), Vec3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(result.get(PointId(1)), Vec3::new(2.0, 4.0, 0.0));
        // Missing contributors do not dilute the result
        assert_relative_eq!(result.get(PointId(2)), Vec3::new(0.0, 0.0, 0.0));
        assert!(!result.has(PointId(3)));
    }

    #[test]
    fn test_normalized_interpolation() {
        let mut source: PropertyMap<PointId, Vec3> = PropertyMap::new();
        source.put(PointId(0), Vec3::x());
        source.put(PointId(1), Vec3::y());
        let sources = vec![vec![(0.5, PointId(0)), (0.5, PointId(1))]];
        let result = interpolate_map(&source, &sources, InterpolationMode::Normalized);
        assert_relative_eq!(result.get(PointId(0)).norm(), 1.0, epsilon = 1e-6);

        let mut tangents: PropertyMap<PointId, Vec4> = PropertyMap::new();
        tangents.put(PointId(0), Vec4::new(2.0, 0.0, 0.0, -1.0));
        let result = interpolate_map(
            &tangents,
            &[vec![(1.0, PointId(0))]],
            InterpolationMode::NormalizedVec3Float,
        );
        assert_relative_eq!(result.get(PointId(0)), Vec4::new(1.0, 0.0, 0.0, -1.0));
    }

    #[test]
    fn test_unsigned_values_pick_strongest() {
        let mut source: PropertyMap<PointId, UVec4> = PropertyMap::new();
        source.put(PointId(0), UVec4::new(1, 2, 3, 4));
        source.put(PointId(1), UVec4::new(5, 6, 7, 8));
        let sources = vec![vec![(0.25, PointId(0)), (0.75, PointId(1))]];
        let result = interpolate_map(&source, &sources, InterpolationMode::Linear);
        assert_eq!(result.get(PointId(0)), UVec4::new(5, 6, 7, 8));
    }

    #[test]
    fn test_create_type_checks() {
        let mut maps: AttributeMaps<PointId> = AttributeMaps::new();
        let position = descriptor(names::POSITION);
        maps.create::<Vec3>(&position)
            .unwrap()
            .put(PointId(0), Vec3::new(1.0, 2.0, 3.0));
        assert!(maps.create::<Vec2>(&position).is_err());
        // Fetching again keeps the existing values
        assert!(maps.create::<Vec3>(&position).unwrap().has(PointId(0)));
        assert!(maps.find::<Vec3>(&AttributeKey::named(names::POSITION)).is_some());
        assert!(maps.find::<Vec4>(&AttributeKey::named(names::POSITION)).is_none());
    }

    #[test]
    fn test_transform_modes() {
        let mut maps: AttributeMaps<PointId> = AttributeMaps::new();
        maps.create::<Vec3>(&descriptor(names::POSITION))
            .unwrap()
            .put(PointId(0), Vec3::new(1.0, 0.0, 0.0));
        maps.create::<Vec3>(&descriptor(names::NORMAL))
            .unwrap()
            .put(PointId(0), Vec3::new(1.0, 0.0, 0.0));
        maps.create::<Vec2>(&descriptor(names::TEXCOORD))
            .unwrap()
            .put(PointId(0), Vec2::new(0.5, 0.5));

        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0))
            .append_translation(&Vec3::new(0.0, 3.0, 0.0));
        let inverse_transpose = matrix.try_inverse().unwrap().transpose();
        maps.transform(&matrix, &inverse_transpose);

        let position = maps.find::<Vec3>(&AttributeKey::named(names::POSITION)).unwrap();
        assert_relative_eq!(position.get(PointId(0)), Vec3::new(2.0, 3.0, 0.0));
        let normal = maps.find::<Vec3>(&AttributeKey::named(names::NORMAL)).unwrap();
        assert_relative_eq!(
            normal.get(PointId(0)),
            Vec3::new(1.0, 0.0, 0.0),
            epsilon = 1e-6
        );
        let texcoord = maps.find::<Vec2>(&AttributeKey::named(names::TEXCOORD)).unwrap();
        assert_relative_eq!(texcoord.get(PointId(0)), Vec2::new(0.5, 0.5));
    }
}
