// hf-core/src/units.rs

use uom::si::f64::{
    Acceleration as UomAcceleration, Length as UomLength, Mass as UomMass,
    MomentOfInertia as UomMomentOfInertia,
};

// Public canonical unit types (SI, f64)
pub type Accel = UomAcceleration;
pub type Length = UomLength;
pub type Mass = UomMass;
pub type Inertia = UomMomentOfInertia;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn kg(v: f64) -> Mass {
    use uom::si::mass::kilogram;
    Mass::new::<kilogram>(v)
}

#[inline]
pub fn kgm2(v: f64) -> Inertia {
    use uom::si::moment_of_inertia::kilogram_square_meter;
    Inertia::new::<kilogram_square_meter>(v)
}

#[inline]
pub fn mps2(v: f64) -> Accel {
    use uom::si::acceleration::meter_per_second_squared;
    Accel::new::<meter_per_second_squared>(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn si_values_round_trip() {
        assert_eq!(m(2.0).value, 2.0);
        assert_eq!(kg(1.5).value, 1.5);
        assert_eq!(kgm2(0.5).value, 0.5);
        assert_eq!(mps2(9.81).value, 9.81);
    }

    #[test]
    fn derived_units_compose() {
        // I = m * r^2
        let inertia: Inertia = kg(2.0) * m(0.5) * m(0.5);
        assert_eq!(inertia, kgm2(0.5));
    }
}
