//! Minimal NumPy `.npy` codec.
//!
//! Decodes C-ordered numeric arrays of any common dtype into `f32`, and encodes `<f4`
//! arrays (format version 1.0).

use crate::data::ndarray::NDArray;
use crate::foundation::error::{PointreelError, PointreelResult};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Float,
    Int,
    Uint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Dtype {
    kind: Kind,
    size: usize,
    big_endian: bool,
}

impl Dtype {
    fn parse(descr: &str) -> PointreelResult<Self> {
        let bad = || PointreelError::load(format!("unsupported npy dtype '{descr}'"));
        let mut chars = descr.chars();
        let order = chars.next().ok_or_else(bad)?;
        let big_endian = match order {
            '<' | '|' | '=' => false,
            '>' => true,
            _ => return Err(bad()),
        };
        let kind = match chars.next().ok_or_else(bad)? {
            'f' => Kind::Float,
            'i' => Kind::Int,
            'u' => Kind::Uint,
            _ => return Err(bad()),
        };
        let size: usize = chars.as_str().parse().map_err(|_| bad())?;
        let ok = match kind {
            Kind::Float => matches!(size, 2 | 4 | 8),
            Kind::Int | Kind::Uint => matches!(size, 1 | 2 | 4 | 8),
        };
        if !ok {
            return Err(bad());
        }
        Ok(Self {
            kind,
            size,
            big_endian,
        })
    }

    fn decode(self, b: &[u8]) -> f32 {
        let mut buf = [0u8; 8];
        buf[..self.size].copy_from_slice(b);
        if self.big_endian {
            buf[..self.size].reverse();
        }
        match (self.kind, self.size) {
            (Kind::Float, 2) => f16_to_f32(u16::from_le_bytes([buf[0], buf[1]])),
            (Kind::Float, 4) => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            (Kind::Float, _) => f64::from_le_bytes(buf) as f32,
            (Kind::Int, 1) => f32::from(buf[0] as i8),
            (Kind::Int, 2) => f32::from(i16::from_le_bytes([buf[0], buf[1]])),
            (Kind::Int, 4) => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f32,
            (Kind::Int, _) => i64::from_le_bytes(buf) as f32,
            (Kind::Uint, 1) => f32::from(buf[0]),
            (Kind::Uint, 2) => f32::from(u16::from_le_bytes([buf[0], buf[1]])),
            (Kind::Uint, 4) => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f32,
            (Kind::Uint, _) => u64::from_le_bytes(buf) as f32,
        }
    }
}

fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exp = u32::from((bits >> 10) & 0x1f);
    let man = u32::from(bits & 0x3ff);

    let out = match (exp, man) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: renormalize into an f32 exponent.
            let mut e = 127 - 15 + 1;
            let mut m = man;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | (e << 23) | ((m & 0x3ff) << 13)
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (man << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (man << 13),
    };
    f32::from_bits(out)
}

/// Locate the raw text following `'key':` in a Python dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}'");
    let at = header.find(&needle)? + needle.len();
    let rest = header[at..].trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start())
}

fn parse_header(header: &str) -> PointreelResult<(Dtype, Vec<usize>)> {
    let descr = dict_value(header, "descr")
        .and_then(|v| {
            let v = v.strip_prefix('\'')?;
            v.find('\'').map(|end| &v[..end])
        })
        .ok_or_else(|| PointreelError::load("npy header is missing 'descr'"))?;
    let dtype = Dtype::parse(descr)?;

    let fortran = dict_value(header, "fortran_order")
        .ok_or_else(|| PointreelError::load("npy header is missing 'fortran_order'"))?;
    if fortran.starts_with("True") {
        return Err(PointreelError::load(
            "fortran-ordered npy arrays are not supported",
        ));
    }

    let shape_src = dict_value(header, "shape")
        .and_then(|v| {
            let v = v.strip_prefix('(')?;
            v.find(')').map(|end| &v[..end])
        })
        .ok_or_else(|| PointreelError::load("npy header is missing 'shape'"))?;
    let shape = shape_src
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| PointreelError::load(format!("invalid npy shape entry '{s}'")))
        })
        .collect::<PointreelResult<Vec<_>>>()?;

    Ok((dtype, shape))
}

/// Decode a complete `.npy` file into an [`NDArray`].
pub fn decode_npy(bytes: &[u8]) -> PointreelResult<NDArray> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(PointreelError::load("not an npy file (bad magic)"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(PointreelError::load("truncated npy header"));
            }
            let n = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (n as usize, 12)
        }
        v => {
            return Err(PointreelError::load(format!(
                "unsupported npy format version {v}"
            )));
        }
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| PointreelError::load("truncated npy header"))?;
    let header = std::str::from_utf8(header)
        .map_err(|_| PointreelError::load("npy header is not valid utf-8"))?;
    let (dtype, shape) = parse_header(header)?;

    let count = element_count(&shape)
        .ok_or_else(|| PointreelError::load(format!("npy shape {shape:?} overflows")))?;
    let payload = &bytes[data_start..];
    let needed = count
        .checked_mul(dtype.size)
        .ok_or_else(|| PointreelError::load("npy payload size overflows"))?;
    if payload.len() < needed {
        return Err(PointreelError::load(format!(
            "truncated npy payload: expected {needed} bytes, got {}",
            payload.len()
        )));
    }

    let data = payload[..needed]
        .chunks_exact(dtype.size)
        .map(|c| dtype.decode(c))
        .collect();
    NDArray::new(shape, data).map_err(|e| PointreelError::load(e.to_string()))
}

fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Encode `data` with `shape` as a little-endian `f4` `.npy` file (format 1.0).
pub fn write_npy_f32(shape: &[usize], data: &[f32]) -> PointreelResult<Vec<u8>> {
    let count = element_count(shape)
        .ok_or_else(|| PointreelError::validation(format!("shape {shape:?} overflows")))?;
    if count != data.len() {
        return Err(PointreelError::validation(format!(
            "shape {shape:?} expects {count} elements, got {}",
            data.len()
        )));
    }

    let dims = match shape {
        [n] => format!("({n},)"),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {dims}, }}");
    // magic(6) + version(2) + len(2) + header + '\n' must be a multiple of 64.
    let unpadded = 10 + header.len() + 1;
    let pad = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat_n(' ', pad));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| PointreelError::validation("npy header too long"))?;

    let mut out = Vec::with_capacity(10 + header.len() + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/data/npy.rs"]
mod tests;
