//! Display unit conversion.
//!
//! Snapshots are always stored in metric (°C, km/h, mb); conversion happens
//! at display time through these closed enums.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub const ALL: &'static [TemperatureUnit] = &[Self::Celsius, Self::Fahrenheit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    pub fn convert(&self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Rounded to whole degrees, e.g. `"21°C"`.
    pub fn format(&self, celsius: f64) -> String {
        format!("{:.0}{}", self.convert(celsius), self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kph,
    Mph,
    Mps,
    Knots,
}

impl WindSpeedUnit {
    pub const ALL: &'static [WindSpeedUnit] = &[Self::Kph, Self::Mph, Self::Mps, Self::Knots];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kph => "kph",
            Self::Mph => "mph",
            Self::Mps => "mps",
            Self::Knots => "knots",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Kph => "km/h",
            Self::Mph => "mph",
            Self::Mps => "m/s",
            Self::Knots => "kn",
        }
    }

    pub fn convert(&self, kph: f64) -> f64 {
        match self {
            Self::Kph => kph,
            Self::Mph => kph / 1.609_344,
            Self::Mps => kph / 3.6,
            Self::Knots => kph / 1.852,
        }
    }

    pub fn format(&self, kph: f64) -> String {
        format!("{:.1} {}", self.convert(kph), self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureUnit {
    #[default]
    Hpa,
    Inhg,
    Mmhg,
}

impl PressureUnit {
    pub const ALL: &'static [PressureUnit] = &[Self::Hpa, Self::Inhg, Self::Mmhg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hpa => "hpa",
            Self::Inhg => "inhg",
            Self::Mmhg => "mmhg",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Hpa => "hPa",
            Self::Inhg => "inHg",
            Self::Mmhg => "mmHg",
        }
    }

    /// Millibar and hectopascal are the same unit.
    pub fn convert(&self, millibar: f64) -> f64 {
        match self {
            Self::Hpa => millibar,
            Self::Inhg => millibar * 0.029_529_983,
            Self::Mmhg => millibar * 0.750_061_683,
        }
    }

    pub fn format(&self, millibar: f64) -> String {
        match self {
            Self::Inhg => format!("{:.2} {}", self.convert(millibar), self.symbol()),
            _ => format!("{:.0} {}", self.convert(millibar), self.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub const ALL: &'static [ThemeMode] = &[Self::System, Self::Light, Self::Dark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

macro_rules! impl_str_conversions {
    ($($ty:ident => $label:literal),* $(,)?) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let lower = value.trim().to_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|u| u.as_str() == lower)
                    .ok_or_else(|| {
                        let accepted: Vec<_> = Self::ALL.iter().map(|u| u.as_str()).collect();
                        anyhow::anyhow!(
                            "Unknown {} '{value}'. Supported: {}.",
                            $label,
                            accepted.join(", ")
                        )
                    })
            }
        }
    )*};
}

impl_str_conversions! {
    TemperatureUnit => "temperature unit",
    WindSpeedUnit => "wind speed unit",
    PressureUnit => "pressure unit",
    ThemeMode => "theme",
}
