//! Accessor packing: typed value runs into little-endian byte runs.
//!
//! Packing is pure with respect to its inputs; the byte offsets and buffer
//! views are assigned later by the session when sections are laid out. Output
//! bytes carry no per-element padding, so alignment between accessors is the
//! session's responsibility.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};

/// Component type of an accessor, with its GL enum code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    F32,
    U32,
    U16,
    U8,
}

impl ComponentType {
    pub fn gl_code(self) -> u32 {
        match self {
            Self::F32 => 5126,
            Self::U32 => 5125,
            Self::U16 => 5123,
            Self::U8 => 5121,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            Self::F32 | Self::U32 => 4,
            Self::U16 => 2,
            Self::U8 => 1,
        }
    }
}

/// Element shape of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn arity(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }
}

/// A packed accessor: the raw bytes plus everything the document entry needs.
#[derive(Debug, Clone)]
pub struct AccessorData {
    pub bytes: Vec<u8>,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub min: Option<Vec<f32>>,
    pub max: Option<Vec<f32>>,
    pub normalized: bool,
    /// Column-major `(arity+1) x (arity+1)` affine decode, quantized
    /// accessors only.
    pub decode_matrix: Option<Vec<f32>>,
}

fn check_arity(count: usize, element_type: ElementType) -> Result<usize> {
    let arity = element_type.arity();
    if count % arity != 0 {
        return Err(Error::ArityMismatch { count, arity });
    }
    Ok(count / arity)
}

/// Component-wise min/max over flattened elements, in one linear scan.
/// Empty input yields all-zero bounds of the declared arity.
fn scan_min_max(values: &[f32], arity: usize) -> (Vec<f32>, Vec<f32>) {
    let mut elements = values.chunks_exact(arity);
    let Some(first) = elements.next() else {
        return (vec![0.0; arity], vec![0.0; arity]);
    };
    let mut min = first.to_vec();
    let mut max = first.to_vec();
    for element in elements {
        for i in 0..arity {
            min[i] = min[i].min(element[i]);
            max[i] = max[i].max(element[i]);
        }
    }
    (min, max)
}

/// Pack float values as FLOAT components.
pub fn pack_f32(
    values: &[f32],
    element_type: ElementType,
    compute_min_max: bool,
) -> Result<AccessorData> {
    let count = check_arity(values.len(), element_type)?;
    let (min, max) = if compute_min_max {
        let (min, max) = scan_min_max(values, element_type.arity());
        (Some(min), Some(max))
    } else {
        (None, None)
    };

    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.write_f32::<LittleEndian>(v)?;
    }

    Ok(AccessorData {
        bytes,
        component_type: ComponentType::F32,
        element_type,
        count,
        min,
        max,
        normalized: false,
        decode_matrix: None,
    })
}

/// Pack u32 values as UNSIGNED_INT components.
pub fn pack_u32(values: &[u32], element_type: ElementType) -> Result<AccessorData> {
    let count = check_arity(values.len(), element_type)?;
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.write_u32::<LittleEndian>(v)?;
    }
    Ok(AccessorData {
        bytes,
        component_type: ComponentType::U32,
        element_type,
        count,
        min: None,
        max: None,
        normalized: false,
        decode_matrix: None,
    })
}

/// Pack u16 values as UNSIGNED_SHORT components.
pub fn pack_u16(values: &[u16], element_type: ElementType) -> Result<AccessorData> {
    let count = check_arity(values.len(), element_type)?;
    let mut bytes = Vec::with_capacity(values.len() * 2);
    for &v in values {
        bytes.write_u16::<LittleEndian>(v)?;
    }
    Ok(AccessorData {
        bytes,
        component_type: ComponentType::U16,
        element_type,
        count,
        min: None,
        max: None,
        normalized: false,
        decode_matrix: None,
    })
}

/// Pack u8 values as UNSIGNED_BYTE components.
pub fn pack_u8(values: &[u8], element_type: ElementType, normalized: bool) -> Result<AccessorData> {
    let count = check_arity(values.len(), element_type)?;
    let mut bytes = Vec::with_capacity(values.len());
    bytes.write_all(values)?;
    Ok(AccessorData {
        bytes,
        component_type: ComponentType::U8,
        element_type,
        count,
        min: None,
        max: None,
        normalized,
        decode_matrix: None,
    })
}

const QUANTIZE_STEPS: f32 = 65535.0;

/// Quantize float values into `[0, 65535]` u16 with a per-component affine
/// remap, and return the decode matrix mapping quantized space back to the
/// original space.
///
/// Degenerate components (`max == min`) get a zero scale: every value
/// quantizes to 0 and decodes to the constant. Lossy-safe: decoding differs
/// from the input by at most one quantization step per component.
pub fn quantize_f32(values: &[f32], element_type: ElementType) -> Result<AccessorData> {
    let arity = element_type.arity();
    if arity > 4 {
        return Err(Error::QuantizeUnsupported {
            element_type: element_type.name(),
        });
    }
    let count = check_arity(values.len(), element_type)?;
    let (min, max) = scan_min_max(values, arity);

    let scale: Vec<f32> = (0..arity)
        .map(|i| {
            let range = max[i] - min[i];
            if range > 0.0 { range / QUANTIZE_STEPS } else { 0.0 }
        })
        .collect();

    let mut bytes = Vec::with_capacity(values.len() * 2);
    for element in values.chunks_exact(arity) {
        for i in 0..arity {
            let q = if scale[i] > 0.0 {
                ((element[i] - min[i]) / scale[i]).round().clamp(0.0, QUANTIZE_STEPS) as u16
            } else {
                0
            };
            bytes.write_u16::<LittleEndian>(q)?;
        }
    }

    // Column-major (arity+1)^2 affine: x = q * scale + min
    let n = arity + 1;
    let mut decode = vec![0.0f32; n * n];
    for i in 0..arity {
        decode[i * n + i] = scale[i];
        decode[arity * n + i] = min[i];
    }
    decode[arity * n + arity] = 1.0;

    Ok(AccessorData {
        bytes,
        component_type: ComponentType::U16,
        element_type,
        count,
        min: Some(min),
        max: Some(max),
        normalized: false,
        decode_matrix: Some(decode),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_is_component_wise() {
        let values = [1.0, -2.0, 3.0, -4.0, 5.0, -6.0];
        let packed = pack_f32(&values, ElementType::Vec3, true).unwrap();
        assert_eq!(packed.min.unwrap(), vec![-4.0, -2.0, -6.0]);
        assert_eq!(packed.max.unwrap(), vec![1.0, 5.0, 3.0]);
        assert_eq!(packed.count, 2);
        assert_eq!(packed.bytes.len(), 24);
    }

    #[test]
    fn empty_input_yields_zero_bounds() {
        let packed = pack_f32(&[], ElementType::Vec2, true).unwrap();
        assert_eq!(packed.min.unwrap(), vec![0.0, 0.0]);
        assert_eq!(packed.max.unwrap(), vec![0.0, 0.0]);
        assert_eq!(packed.count, 0);
        assert!(packed.bytes.is_empty());
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        assert!(matches!(
            pack_f32(&[1.0, 2.0, 3.0, 4.0], ElementType::Vec3, false),
            Err(Error::ArityMismatch { count: 4, arity: 3 })
        ));
    }

    #[test]
    fn u16_values_pack_little_endian() {
        let packed = pack_u16(&[1, 0x0203], ElementType::Scalar).unwrap();
        assert_eq!(packed.bytes, vec![1, 0, 3, 2]);
        assert_eq!(packed.component_type.gl_code(), 5123);
    }

    fn decode(packed: &AccessorData, quantized: &[u16]) -> Vec<f32> {
        let arity = packed.element_type.arity();
        let n = arity + 1;
        let decode = packed.decode_matrix.as_ref().unwrap();
        quantized
            .chunks_exact(arity)
            .flat_map(|q| {
                (0..arity).map(move |i| q[i] as f32 * decode[i * n + i] + decode[arity * n + i])
            })
            .collect()
    }

    #[test]
    fn quantize_round_trip_within_one_step() {
        let values = [0.0, 10.0, 1.25, 2.5, 4.0, -10.0];
        let packed = quantize_f32(&values, ElementType::Vec2).unwrap();

        let quantized: Vec<u16> = packed
            .bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        let decoded = decode(&packed, &quantized);

        let min = packed.min.as_ref().unwrap();
        let max = packed.max.as_ref().unwrap();
        for (element, decoded) in values.chunks_exact(2).zip(decoded.chunks_exact(2)) {
            for i in 0..2 {
                let step = (max[i] - min[i]) / 65535.0;
                assert!((element[i] - decoded[i]).abs() <= step);
            }
        }

        // exact extremes land on the ends of the quantized range
        assert_eq!(quantized[0], 0); // x min
        assert_eq!(quantized[5], 0); // y min
        assert_eq!(quantized[4], 65535); // x max
        assert_eq!(quantized[1], 65535); // y max
        assert_eq!(min, &vec![0.0, -10.0]);
        assert_eq!(max, &vec![4.0, 10.0]);
    }

    #[test]
    fn degenerate_range_decodes_to_constant() {
        let values = [7.5, 7.5, 7.5];
        let packed = quantize_f32(&values, ElementType::Scalar).unwrap();
        let quantized: Vec<u16> = packed
            .bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(quantized, vec![0, 0, 0]);
        // zero scale, offset carries the constant
        let decoded = decode(&packed, &quantized);
        assert_eq!(decoded, vec![7.5, 7.5, 7.5]);
    }

    #[test]
    fn quantize_rejects_matrices() {
        assert!(matches!(
            quantize_f32(&[0.0; 16], ElementType::Mat4),
            Err(Error::QuantizeUnsupported { .. })
        ));
    }
}
