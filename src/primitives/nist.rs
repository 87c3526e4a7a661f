//! NIST P-256 scalar multiplication through the `p256` crate.
//!
//! Converts between the affine [`Point`] representation and
//! `p256::ProjectivePoint`, so that multiplications involving secrets run in
//! constant time on the production curve.

use num_bigint::BigUint;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::PrimeField;
use p256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use zeroize::Zeroizing;

use super::curve::Point;

/// Number of bytes in a P-256 field element or scalar.
const P256_BYTES: usize = 32;

/// Computes `scalar * point`, reducing `scalar` modulo `order` first.
///
/// Returns `None` if `point` is not a valid P-256 point.
pub(crate) fn mul(scalar: &BigUint, order: &BigUint, point: &Point) -> Option<Point> {
    let base = to_projective(point)?;

    let reduced = Zeroizing::new((scalar % order).to_bytes_be());
    let mut repr = Zeroizing::new([0u8; P256_BYTES]);
    repr[P256_BYTES - reduced.len()..].copy_from_slice(&reduced);
    let scalar = Option::<Scalar>::from(Scalar::from_repr((*repr).into()))?;

    Some(from_projective(&(base * scalar)))
}

fn to_projective(point: &Point) -> Option<ProjectivePoint> {
    let Some((x, y)) = point.coordinates() else {
        return Some(ProjectivePoint::IDENTITY);
    };
    let encoded = EncodedPoint::from_affine_coordinates(&field_bytes(x)?, &field_bytes(y)?, false);
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded)).map(ProjectivePoint::from)
}

fn from_projective(point: &ProjectivePoint) -> Point {
    let encoded = point.to_affine().to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Point::affine(BigUint::from_bytes_be(x), BigUint::from_bytes_be(y)),
        _ => Point::Identity,
    }
}

fn field_bytes(value: &BigUint) -> Option<FieldBytes> {
    let bytes = value.to_bytes_be();
    if bytes.len() > P256_BYTES {
        return None;
    }
    let mut out = FieldBytes::default();
    out[P256_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}
