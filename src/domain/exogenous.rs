use serde::{Deserialize, Serialize};

/// Exogenous inputs shared by every home, indexed by absolute step offset
/// from the start of the data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExogenousSeries {
    /// Outdoor air temperature (°C)
    pub ambient_temp: Vec<f64>,
    /// Global horizontal irradiance (W/m²)
    pub irradiance: Vec<f64>,
    /// Wholesale / time-of-use price ($/kWh)
    pub wholesale_price: Vec<f64>,
}

impl ExogenousSeries {
    /// Constant series of `len` steps.
    pub fn constant(len: usize, ambient_temp: f64, irradiance: f64, wholesale_price: f64) -> Self {
        Self {
            ambient_temp: vec![ambient_temp; len],
            irradiance: vec![irradiance; len],
            wholesale_price: vec![wholesale_price; len],
        }
    }

    /// Number of steps covered by all three series.
    pub fn len(&self) -> usize {
        self.ambient_temp
            .len()
            .min(self.irradiance.len())
            .min(self.wholesale_price.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
