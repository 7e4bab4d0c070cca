//! Home records
//!
//! A [`Home`] is created once when the community is populated and never
//! mutated afterwards. Behaviour that depends on installed equipment is
//! selected through the [`HomeKind`] variant, which carries only the
//! parameters relevant to that variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Stable identifier of a home. Doubles as the home's key in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HomeId(pub String);

impl HomeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat label for a home's variant, used in logs and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HomeVariant {
    Base,
    PvOnly,
    BatteryOnly,
    PvBattery,
}

/// Space-conditioning envelope and HVAC ratings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvacParams {
    /// Envelope thermal resistance (°C/kW)
    pub r: f64,
    /// Envelope thermal capacitance (kWh/°C)
    pub c: f64,
    /// Cooling power when on (kW)
    pub p_cool: f64,
    /// Heating power when on (kW)
    pub p_heat: f64,
    pub temp_in_min: f64,
    pub temp_in_max: f64,
    pub temp_in_setpoint: f64,
    pub temp_in_init: f64,
}

/// One scheduled hot-water draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterDraw {
    /// Control step, counted from the start of the run
    pub step: usize,
    /// Drawn volume (litres)
    pub volume_l: f64,
}

/// Heat capacity of liquid water (kWh per litre per °C).
pub const WATER_KWH_PER_L_C: f64 = 4.186 / 3600.0;

/// Electric water heater coupled to the indoor air.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterHeaterParams {
    /// Tank-to-indoor thermal resistance (°C/kW)
    pub r: f64,
    /// Tank thermal capacitance (kWh/°C)
    pub c: f64,
    /// Element power when on (kW)
    pub p: f64,
    pub temp_wh_min: f64,
    pub temp_wh_max: f64,
    pub temp_wh_setpoint: f64,
    pub temp_wh_init: f64,
    /// Tank size (litres)
    pub tank_size_l: f64,
    /// Draw schedule, sorted by step
    pub draws: Vec<WaterDraw>,
}

impl WaterHeaterParams {
    /// Litres of water holding the same heat as the tank node's capacitance.
    pub fn thermal_volume_l(&self) -> f64 {
        self.c / WATER_KWH_PER_L_C
    }

    /// Share of the tank node's heat replaced by tap water during `step`.
    ///
    /// Measured against [`Self::thermal_volume_l`] so mixing and the RC
    /// recurrence describe the same thermal mass. At most one tank volume is
    /// drawn per step.
    pub fn draw_fraction(&self, step: usize) -> f64 {
        let thermal = self.thermal_volume_l();
        if thermal <= 0.0 {
            return 0.0;
        }
        let start = self.draws.partition_point(|d| d.step < step);
        let mut volume: f64 = self.draws[start..]
            .iter()
            .take_while(|d| d.step == step)
            .map(|d| d.volume_l)
            .sum();
        if self.tank_size_l > 0.0 {
            volume = volume.min(self.tank_size_l);
        }
        (volume / thermal).clamp(0.0, 1.0)
    }
}

/// Home battery. Energy bounds are absolute (kWh), already derived from the
/// fractional capacity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryParams {
    /// Max charge / discharge rate (kW)
    pub max_rate: f64,
    /// Nominal capacity (kWh)
    pub capacity: f64,
    pub capacity_lower: f64,
    pub capacity_upper: f64,
    pub charge_eff: f64,
    pub discharge_eff: f64,
    pub e_batt_init: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvParams {
    /// Collector area (m²)
    pub area: f64,
    /// Panel efficiency (0-1)
    pub efficiency: f64,
}

impl PvParams {
    /// Uncurtailed generation (kW) for an irradiance in W/m².
    pub fn available_kw(&self, irradiance_w_m2: f64) -> f64 {
        irradiance_w_m2 * self.area * self.efficiency / 1000.0
    }
}

/// Installed equipment beyond the base HVAC + water heater.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HomeKind {
    Base,
    PvOnly { pv: PvParams },
    BatteryOnly { battery: BatteryParams },
    PvBattery { pv: PvParams, battery: BatteryParams },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Home {
    pub id: HomeId,
    pub hvac: HvacParams,
    pub water_heater: WaterHeaterParams,
    pub kind: HomeKind,
}

impl Home {
    pub fn variant(&self) -> HomeVariant {
        match self.kind {
            HomeKind::Base => HomeVariant::Base,
            HomeKind::PvOnly { .. } => HomeVariant::PvOnly,
            HomeKind::BatteryOnly { .. } => HomeVariant::BatteryOnly,
            HomeKind::PvBattery { .. } => HomeVariant::PvBattery,
        }
    }

    pub fn battery(&self) -> Option<&BatteryParams> {
        match &self.kind {
            HomeKind::BatteryOnly { battery } | HomeKind::PvBattery { battery, .. } => Some(battery),
            _ => None,
        }
    }

    pub fn pv(&self) -> Option<&PvParams> {
        match &self.kind {
            HomeKind::PvOnly { pv } | HomeKind::PvBattery { pv, .. } => Some(pv),
            _ => None,
        }
    }

    /// Sum of every device's rated draw from the grid (kW).
    ///
    /// Heating and cooling are mutually exclusive, so only the larger counts.
    pub fn rated_power_kw(&self) -> f64 {
        let hvac = self.hvac.p_cool.max(self.hvac.p_heat);
        let battery = self.battery().map(|b| b.max_rate).unwrap_or(0.0);
        hvac + self.water_heater.p + battery
    }
}
