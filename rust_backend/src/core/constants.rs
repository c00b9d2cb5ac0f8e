//! Versioned physical constants.
//!
//! The geometric transit probability and the re-derivation of injected planet radii
//! both depend on unit constants. They are collected here in one auditable table that
//! travels with each request instead of being pulled implicitly from a units library.

use qtty::length::nominal::{EarthRadius, SolarRadius, SolarRadiuses};
use qtty::{Kilogram, Kilograms, Kilometer, Kilometers, Meter, SolarMass, SolarMasses};
use serde::{Deserialize, Serialize};

use super::error::{CompletenessError, CompletenessResult};

/// Solar and Earth radii used to turn `Rp/Rs` into a planet radius in Earth radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusConversion {
    pub solar_radius: Kilometers,
    pub earth_radius: Kilometers,
}

impl RadiusConversion {
    /// Number of Earth radii in one solar radius.
    pub fn earth_radii_per_solar_radius(&self) -> f64 {
        self.solar_radius.value() / self.earth_radius.value()
    }

    /// Planet radius in Earth radii from a radius ratio and a stellar radius in R☉.
    pub fn planet_radius(&self, radius_ratio: f64, stellar_radius_rsun: f64) -> f64 {
        radius_ratio * stellar_radius_rsun * self.earth_radii_per_solar_radius()
    }
}

/// A named, versioned table of the constants the pipeline depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub version: String,
    /// Newtonian constant of gravitation in m³ kg⁻¹ s⁻².
    pub gravitational_constant: f64,
    pub solar_mass: Kilograms,
    pub solar_radius: Kilometers,
    pub radius_conversion: RadiusConversion,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self::astropy_iau2015()
    }
}

impl PhysicalConstants {
    pub const ASTROPY_IAU2015: &'static str = "astropy_iau2015";
    pub const QTTY_NOMINAL: &'static str = "qtty_nominal";

    /// CODATA 2018 G with IAU 2015 nominal solar values, matching the reference
    /// completeness products. Injected radii use the 696 340 km / 6 371 km pair.
    pub fn astropy_iau2015() -> Self {
        Self {
            version: Self::ASTROPY_IAU2015.to_string(),
            gravitational_constant: 6.674_30e-11,
            solar_mass: Kilograms::new(1.988_409_870_698_051e30),
            solar_radius: Kilometers::new(695_700.0),
            radius_conversion: RadiusConversion {
                solar_radius: Kilometers::new(696_340.0),
                earth_radius: Kilometers::new(6_371.0),
            },
        }
    }

    /// Every solar and Earth value taken from the `qtty` nominal units.
    pub fn qtty_nominal() -> Self {
        let solar_radius = SolarRadiuses::new(1.0).to::<Kilometer>();
        Self {
            version: Self::QTTY_NOMINAL.to_string(),
            gravitational_constant: 6.674_30e-11,
            solar_mass: SolarMasses::new(1.0).to::<Kilogram>(),
            solar_radius,
            radius_conversion: RadiusConversion {
                solar_radius,
                earth_radius: qtty::Quantity::<EarthRadius>::new(1.0).to::<Kilometer>(),
            },
        }
    }

    /// Looks up a preset by its version label.
    pub fn from_preset(name: &str) -> CompletenessResult<Self> {
        match name {
            Self::ASTROPY_IAU2015 => Ok(Self::astropy_iau2015()),
            Self::QTTY_NOMINAL => Ok(Self::qtty_nominal()),
            other => Err(CompletenessError::Configuration(format!(
                "Unknown constants preset: {}. Use '{}' or '{}'",
                other,
                Self::ASTROPY_IAU2015,
                Self::QTTY_NOMINAL
            ))),
        }
    }

    /// Solar radius in metres.
    pub fn solar_radius_m(&self) -> f64 {
        self.solar_radius.to::<Meter>().value()
    }

    /// Solar mass in kilograms.
    pub fn solar_mass_kg(&self) -> f64 {
        self.solar_mass.value()
    }

    /// Checks that every constant is finite and positive.
    pub fn validate(&self) -> CompletenessResult<()> {
        let values = [
            ("gravitational_constant", self.gravitational_constant),
            ("solar_mass", self.solar_mass.value()),
            ("solar_radius", self.solar_radius.value()),
            ("radius_conversion.solar_radius", self.radius_conversion.solar_radius.value()),
            ("radius_conversion.earth_radius", self.radius_conversion.earth_radius.value()),
        ];
        for (name, value) in values {
            if !(value.is_finite() && value > 0.0) {
                return Err(CompletenessError::Configuration(format!(
                    "constant '{}' must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Nominal solar radius in metres according to `qtty`.
pub fn nominal_solar_radius_m() -> f64 {
    qtty::Quantity::<SolarRadius>::new(1.0).to::<Meter>().value()
}

/// Nominal solar mass in kilograms according to `qtty`.
pub fn nominal_solar_mass_kg() -> f64 {
    qtty::Quantity::<SolarMass>::new(1.0).to::<Kilogram>().value()
}
