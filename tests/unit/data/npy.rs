use super::*;

fn npy_with(descr: &str, shape: &str, payload: &[u8]) -> Vec<u8> {
    npy_raw(
        &format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}"),
        payload,
    )
}

fn npy_raw(dict: &str, payload: &[u8]) -> Vec<u8> {
    let mut header = dict.to_string();
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');
    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

#[test]
fn written_header_is_aligned_and_decodes() {
    let data: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
    let bytes = write_npy_f32(&[2, 3, 2], &data).unwrap();
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    assert_eq!((10 + header_len) % 64, 0);

    let a = decode_npy(&bytes).unwrap();
    assert_eq!(a.shape(), &[2, 3, 2]);
    assert_eq!(a.at(&[1, 2, 1]), Some(5.5));
}

#[test]
fn one_dimensional_shape_uses_trailing_comma() {
    let bytes = write_npy_f32(&[3], &[0.0, 1.0, 2.0]).unwrap();
    let text = String::from_utf8_lossy(&bytes[10..]);
    assert!(text.contains("'shape': (3,)"));
    assert_eq!(decode_npy(&bytes).unwrap().shape(), &[3]);
}

#[test]
fn decodes_integer_and_big_endian_dtypes() {
    let payload: Vec<u8> = [7i64, -2].iter().flat_map(|v| v.to_le_bytes()).collect();
    let a = decode_npy(&npy_with("<i8", "(2,)", &payload)).unwrap();
    assert_eq!(a.data(), &[7.0, -2.0]);

    let payload: Vec<u8> = [1.5f32, -4.0].iter().flat_map(|v| v.to_be_bytes()).collect();
    let a = decode_npy(&npy_with(">f4", "(2,)", &payload)).unwrap();
    assert_eq!(a.data(), &[1.5, -4.0]);

    let a = decode_npy(&npy_with("|u1", "(3,)", &[0, 9, 255])).unwrap();
    assert_eq!(a.data(), &[0.0, 9.0, 255.0]);
}

#[test]
fn decodes_half_precision() {
    // 1.0, -2.0, 0.5, smallest subnormal
    let halves: [u16; 4] = [0x3c00, 0xc000, 0x3800, 0x0001];
    let payload: Vec<u8> = halves.iter().flat_map(|v| v.to_le_bytes()).collect();
    let a = decode_npy(&npy_with("<f2", "(4,)", &payload)).unwrap();
    assert_eq!(&a.data()[..3], &[1.0, -2.0, 0.5]);
    assert!((a.data()[3] - 5.960_464_5e-8).abs() < 1e-12);
}

#[test]
fn rejects_bad_inputs() {
    assert!(decode_npy(b"not numpy at all").unwrap_err().is_load());

    let fortran = npy_raw(
        "{'descr': '<f4', 'fortran_order': True, 'shape': (1,), }",
        &[0; 4],
    );
    let err = decode_npy(&fortran).unwrap_err();
    assert!(err.to_string().contains("fortran"));

    let err = decode_npy(&npy_with("<c8", "(1,)", &[0; 8])).unwrap_err();
    assert!(err.to_string().contains("unsupported npy dtype"));

    let err = decode_npy(&npy_with("<f4", "(4,)", &[0; 8])).unwrap_err();
    assert!(err.to_string().contains("truncated npy payload"));
}

#[test]
fn writer_rejects_shape_mismatch() {
    assert!(write_npy_f32(&[2, 2], &[0.0; 3]).is_err());
    assert!(write_npy_f32(&[usize::MAX, 2], &[]).is_err());
}

#[test]
fn overflowing_shape_is_a_load_error() {
    let bytes = npy_with("<f4", "(4294967296, 4294967296, 2)", &[0; 16]);
    let err = decode_npy(&bytes).unwrap_err();
    assert!(err.is_load());
    assert!(err.to_string().contains("overflows"));
}
