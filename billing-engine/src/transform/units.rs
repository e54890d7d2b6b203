use serde::{Deserialize, Serialize};

/// Physical properties of the fuel that recovered heat displaces.
///
/// Defaults describe #1 heating oil burned at 80% efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelConversion {
    /// Energy content per unit volume, in meter energy units (BTU/gal).
    #[serde(default = "default_energy_content")]
    pub energy_content: f64,
    /// Fraction of the fuel's energy the displaced appliance delivers.
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
}

impl Default for FuelConversion {
    fn default() -> Self {
        Self {
            energy_content: default_energy_content(),
            efficiency: default_efficiency(),
        }
    }
}

impl FuelConversion {
    pub fn volume(&self, delta_energy: f64) -> f64 {
        to_volume(delta_energy, self.energy_content, self.efficiency)
    }
}

/// Volume of fuel that would have had to be burned to deliver `delta_energy`.
pub fn to_volume(delta_energy: f64, energy_content: f64, efficiency: f64) -> f64 {
    delta_energy / (energy_content * efficiency)
}

fn default_energy_content() -> f64 {
    138_500.0
}

fn default_efficiency() -> f64 {
    0.80
}
