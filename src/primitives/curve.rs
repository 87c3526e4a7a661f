//! Short-Weierstrass elliptic curves over prime fields.
//!
//! Points are kept in affine coordinates with arbitrary-precision integer
//! coordinates so the same representation serves NIST P-256 and the tiny
//! demonstration curve used by the test-suite.
//!
//! # Security Note
//!
//! On P-256, scalar multiplication goes through the `p256` crate and is
//! constant-time in the scalar. Other curves use a plain double-and-add
//! ladder, which is not.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::nist;
use crate::{Error, Result};

/// NIST P-256 field modulus.
const P256_P: &str = "ffffffff00000001000000000000000000000000ffffffffffffffffffffffff";
/// NIST P-256 curve coefficient `b` (`a` is `p - 3`).
const P256_B: &str = "5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b";
const P256_GX: &str = "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296";
const P256_GY: &str = "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5";
/// NIST P-256 group order.
const P256_N: &str = "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551";

/// Name of the NIST P-256 curve.
pub const P256_NAME: &str = "P-256";
/// Name of the 17-element demonstration curve.
pub const TOY_NAME: &str = "toy-17";

/// A point on an elliptic curve, or the point at infinity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Point {
    /// The group identity (point at infinity).
    Identity,
    /// A finite point.
    Affine {
        /// The x coordinate.
        x: BigUint,
        /// The y coordinate.
        y: BigUint,
    },
}

impl Point {
    /// Creates a finite point from its coordinates.
    pub fn affine(x: BigUint, y: BigUint) -> Self {
        Self::Affine { x, y }
    }

    /// Returns true for the point at infinity.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Returns `(x, y)` for a finite point.
    pub fn coordinates(&self) -> Option<(&BigUint, &BigUint)> {
        match self {
            Self::Identity => None,
            Self::Affine { x, y } => Some((x, y)),
        }
    }
}

/// How scalar multiplication is carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Arithmetic {
    Ladder,
    P256,
}

/// Domain parameters of a prime-order curve `y^2 = x^3 + ax + b (mod p)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Curve {
    name: &'static str,
    p: BigUint,
    a: BigUint,
    b: BigUint,
    g: Point,
    n: BigUint,
    arithmetic: Arithmetic,
}

impl Curve {
    /// Builds a curve from raw parameters, checking that `G` lies on the curve
    /// and has order `n`.
    pub fn new(
        name: &'static str,
        p: BigUint,
        a: BigUint,
        b: BigUint,
        g: Point,
        n: BigUint,
    ) -> Result<Self> {
        if p <= BigUint::from(3u32) {
            return Err(Error::InvalidParams(format!("{name}: field modulus too small")));
        }
        if n <= BigUint::one() {
            return Err(Error::InvalidParams(format!("{name}: group order too small")));
        }

        let a = a % &p;
        let b = b % &p;
        let discriminant = (BigUint::from(4u32) * a.modpow(&BigUint::from(3u32), &p)
            + BigUint::from(27u32) * b.modpow(&BigUint::from(2u32), &p))
            % &p;
        if discriminant.is_zero() {
            return Err(Error::InvalidParams(format!("{name}: curve is singular")));
        }

        let mut curve = Self {
            name,
            p,
            a,
            b,
            g,
            n,
            arithmetic: Arithmetic::Ladder,
        };
        if curve.same_group(&Self::p256()) {
            curve.arithmetic = Arithmetic::P256;
        }

        if curve.g.is_identity() || !curve.contains(&curve.g) {
            return Err(Error::InvalidParams(format!(
                "{name}: generator is not a point on the curve"
            )));
        }
        if !curve.mul(&curve.n, &curve.g).is_identity() {
            return Err(Error::InvalidParams(format!(
                "{name}: generator does not have the stated order"
            )));
        }

        Ok(curve)
    }

    /// NIST P-256 (secp256r1).
    pub fn p256() -> Self {
        let p = hex_constant(P256_P);
        let a = &p - BigUint::from(3u32);
        Self {
            name: P256_NAME,
            a,
            b: hex_constant(P256_B),
            g: Point::affine(hex_constant(P256_GX), hex_constant(P256_GY)),
            n: hex_constant(P256_N),
            p,
            arithmetic: Arithmetic::P256,
        }
    }

    /// `y^2 = x^3 + 2x + 4 (mod 13)` with `G = (0, 2)` of order 17.
    ///
    /// Offers no security whatsoever; it exists so protocol runs can be
    /// followed by hand.
    pub fn toy() -> Self {
        Self {
            name: TOY_NAME,
            p: BigUint::from(13u32),
            a: BigUint::from(2u32),
            b: BigUint::from(4u32),
            g: Point::affine(BigUint::zero(), BigUint::from(2u32)),
            n: BigUint::from(17u32),
            arithmetic: Arithmetic::Ladder,
        }
    }

    /// Looks up a built-in curve by name.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            P256_NAME => Ok(Self::p256()),
            TOY_NAME => Ok(Self::toy()),
            other => Err(Error::InvalidParams(format!("Unknown curve '{other}'"))),
        }
    }

    /// Returns the curve name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the field modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.p
    }

    /// Returns the order `N` of the base point.
    pub fn order(&self) -> &BigUint {
        &self.n
    }

    /// Returns the base point `G`.
    pub fn generator(&self) -> &Point {
        &self.g
    }

    /// Checks whether `point` satisfies the curve equation with reduced
    /// coordinates. The identity is always on the curve.
    pub fn contains(&self, point: &Point) -> bool {
        let Some((x, y)) = point.coordinates() else {
            return true;
        };
        if x >= &self.p || y >= &self.p {
            return false;
        }

        let lhs = (y * y) % &self.p;
        let rhs = (x * x * x + &self.a * x + &self.b) % &self.p;
        lhs == rhs
    }

    /// Returns `-point`.
    pub fn negate(&self, point: &Point) -> Point {
        match point {
            Point::Identity => Point::Identity,
            Point::Affine { x, y } => Point::affine(x % &self.p, self.sub(&BigUint::zero(), y)),
        }
    }

    /// Point addition `lhs + rhs`.
    pub fn add(&self, lhs: &Point, rhs: &Point) -> Point {
        let (x1, y1, x2, y2) = match (lhs, rhs) {
            (Point::Identity, other) | (other, Point::Identity) => return other.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (
                x1 % &self.p,
                y1 % &self.p,
                x2 % &self.p,
                y2 % &self.p,
            ),
        };

        if x1 == x2 {
            if ((&y1 + &y2) % &self.p).is_zero() {
                return Point::Identity;
            }
            return self.double(lhs);
        }

        let lambda = (self.sub(&y2, &y1) * self.invert(&self.sub(&x2, &x1))) % &self.p;
        self.chord_point(&lambda, &x1, &y1, &x2)
    }

    /// Point doubling `2 * point`.
    pub fn double(&self, point: &Point) -> Point {
        let Some((x, y)) = point.coordinates() else {
            return Point::Identity;
        };
        let x = x % &self.p;
        let y = y % &self.p;
        if y.is_zero() {
            return Point::Identity;
        }

        let numerator = (BigUint::from(3u32) * &x * &x + &self.a) % &self.p;
        let denominator = (BigUint::from(2u32) * &y) % &self.p;
        let lambda = (numerator * self.invert(&denominator)) % &self.p;
        self.chord_point(&lambda, &x, &y, &x)
    }

    /// Scalar multiplication `scalar * point`.
    pub fn mul(&self, scalar: &BigUint, point: &Point) -> Point {
        if self.arithmetic == Arithmetic::P256 {
            if let Some(product) = nist::mul(scalar, &self.n, point) {
                return product;
            }
        }
        self.ladder(scalar, point)
    }

    /// Scalar multiplication of the base point, `scalar * G`.
    pub fn mul_base(&self, scalar: &BigUint) -> Point {
        self.mul(scalar, &self.g)
    }

    // Off-curve inputs still get an answer here; callers check `contains`.
    fn ladder(&self, scalar: &BigUint, point: &Point) -> Point {
        let mut acc = Point::Identity;
        for bit in (0..scalar.bits()).rev() {
            acc = self.double(&acc);
            if scalar.bit(bit) {
                acc = self.add(&acc, point);
            }
        }
        acc
    }

    fn same_group(&self, other: &Self) -> bool {
        self.p == other.p && self.a == other.a && self.b == other.b && self.g == other.g && self.n == other.n
    }

    // x3 = lambda^2 - x1 - x2, y3 = lambda * (x1 - x3) - y1
    fn chord_point(&self, lambda: &BigUint, x1: &BigUint, y1: &BigUint, x2: &BigUint) -> Point {
        let lambda_sq = (lambda * lambda) % &self.p;
        let x3 = self.sub(&self.sub(&lambda_sq, x1), x2);
        let y3 = self.sub(&((lambda * self.sub(x1, &x3)) % &self.p), y1);
        Point::affine(x3, y3)
    }

    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        ((a % &self.p) + &self.p - (b % &self.p)) % &self.p
    }

    // p is prime, so a^(p-2) is the inverse of any non-zero a.
    fn invert(&self, value: &BigUint) -> BigUint {
        value.modpow(&(&self.p - BigUint::from(2u32)), &self.p)
    }
}

fn hex_constant(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16)
        .unwrap_or_else(|| unreachable!("curve constants are valid hex"))
}

#[cfg(test)]
mod tests {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    use super::*;

    fn toy_point(x: u32, y: u32) -> Point {
        Point::affine(BigUint::from(x), BigUint::from(y))
    }

    #[test]
    fn builtin_curves_pass_validation() {
        for curve in [Curve::p256(), Curve::toy()] {
            let rebuilt = Curve::new(
                curve.name,
                curve.p.clone(),
                curve.a.clone(),
                curve.b.clone(),
                curve.g.clone(),
                curve.n.clone(),
            )
            .unwrap();
            assert_eq!(rebuilt, curve);
        }
    }

    #[test]
    fn rejects_generator_off_curve() {
        let result = Curve::new(
            "bad",
            BigUint::from(13u32),
            BigUint::from(2u32),
            BigUint::from(4u32),
            toy_point(1, 1),
            BigUint::from(17u32),
        );
        assert!(matches!(result, Err(Error::InvalidParams(_))));
    }

    #[test]
    fn rejects_wrong_order() {
        let result = Curve::new(
            "bad",
            BigUint::from(13u32),
            BigUint::from(2u32),
            BigUint::from(4u32),
            toy_point(0, 2),
            BigUint::from(19u32),
        );
        assert!(matches!(result, Err(Error::InvalidParams(_))));
    }

    #[test]
    fn toy_multiples_match_hand_computation() {
        let curve = Curve::toy();
        let expected = [
            (3u32, toy_point(12, 1)),
            (4, toy_point(2, 9)),
            (5, toy_point(7, 6)),
            (6, toy_point(5, 10)),
            (7, toy_point(9, 7)),
        ];
        for (k, point) in expected {
            assert_eq!(curve.mul_base(&BigUint::from(k)), point, "{k}G");
        }
        assert!(curve.mul_base(&BigUint::from(17u32)).is_identity());
        assert!(curve.mul_base(&BigUint::zero()).is_identity());
    }

    #[test]
    fn every_toy_multiple_is_on_curve() {
        let curve = Curve::toy();
        for k in 0u32..=17 {
            assert!(curve.contains(&curve.mul_base(&BigUint::from(k))));
        }
    }

    #[test]
    fn addition_with_negation_is_identity() {
        let curve = Curve::toy();
        let p = curve.mul_base(&BigUint::from(5u32));
        let neg = curve.negate(&p);
        assert!(curve.add(&p, &neg).is_identity());
        assert_eq!(neg, curve.mul_base(&BigUint::from(12u32)));
    }

    #[test]
    fn addition_of_equal_points_doubles() {
        let curve = Curve::toy();
        let p = curve.mul_base(&BigUint::from(3u32));
        assert_eq!(curve.add(&p, &p), curve.double(&p));
        assert_eq!(curve.double(&p), curve.mul_base(&BigUint::from(6u32)));
    }

    #[test]
    fn identity_is_neutral() {
        let curve = Curve::p256();
        let g = curve.generator().clone();
        assert_eq!(curve.add(&Point::Identity, &g), g);
        assert_eq!(curve.add(&g, &Point::Identity), g);
        assert!(curve.double(&Point::Identity).is_identity());
    }

    #[test]
    fn p256_multiplication_agrees_with_reference_implementation() {
        let curve = Curve::p256();
        for k in [1u64, 2, 7, 0xdead_beef, u64::MAX] {
            let ours = curve.mul_base(&BigUint::from(k));
            let reference = (p256::ProjectivePoint::GENERATOR * p256::Scalar::from(k))
                .to_affine()
                .to_encoded_point(false);
            let expected = Point::affine(
                BigUint::from_bytes_be(reference.x().unwrap()),
                BigUint::from_bytes_be(reference.y().unwrap()),
            );
            assert_eq!(ours, expected, "k = {k}");
        }
    }

    #[test]
    fn p256_backend_agrees_with_ladder() {
        let curve = Curve::p256();
        let point = curve.mul_base(&BigUint::from(0x1234_5678u64));
        for k in [BigUint::from(3u32), curve.order() - 1u32, curve.order() + 2u32] {
            assert_eq!(curve.mul(&k, &point), curve.ladder(&k, &point));
        }
    }

    #[test]
    fn rebuilt_p256_keeps_its_backend() {
        let curve = Curve::p256();
        let rebuilt = Curve::new(
            "NIST P-256",
            curve.p.clone(),
            curve.a.clone(),
            curve.b.clone(),
            curve.g.clone(),
            curve.n.clone(),
        )
        .unwrap();
        assert_eq!(rebuilt.arithmetic, Arithmetic::P256);
        assert_eq!(Curve::toy().arithmetic, Arithmetic::Ladder);
    }

    #[test]
    fn contains_rejects_unreduced_coordinates() {
        let curve = Curve::toy();
        assert!(!curve.contains(&toy_point(13, 2)));
        assert!(!curve.contains(&toy_point(0, 3)));
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Curve::by_name("P-256").unwrap(), Curve::p256());
        assert_eq!(Curve::by_name("toy-17").unwrap(), Curve::toy());
        assert!(Curve::by_name("secp256k1").is_err());
    }
}
