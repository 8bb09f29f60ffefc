use serde::{Deserialize, Serialize};

/// The closed set of vehicle presets a player can pick at join time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    #[default]
    Default,
    Sports,
    Truck,
}

/// Handling characteristics of a vehicle preset.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub handling: f32,
    pub braking: f32,
    pub mass: f32,
    pub drag: f32,
    pub color: &'static str,
}

impl VehicleType {
    /// Looks up a preset by name. Unknown names fall back to `Default`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "sports" => VehicleType::Sports,
            "truck" => VehicleType::Truck,
            _ => VehicleType::Default,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleType::Default => "default",
            VehicleType::Sports => "sports",
            VehicleType::Truck => "truck",
        }
    }

    pub fn stats(&self) -> VehicleStats {
        match self {
            VehicleType::Default => VehicleStats {
                max_speed: 40.0,
                acceleration: 10.0,
                handling: 0.5,
                braking: 0.7,
                mass: 1000.0,
                drag: 0.3,
                color: "#FF5500",
            },
            VehicleType::Sports => VehicleStats {
                max_speed: 60.0,
                acceleration: 15.0,
                handling: 0.8,
                braking: 0.9,
                mass: 1200.0,
                drag: 0.25,
                color: "#0055FF",
            },
            VehicleType::Truck => VehicleStats {
                max_speed: 30.0,
                acceleration: 5.0,
                handling: 0.3,
                braking: 0.5,
                mass: 2500.0,
                drag: 0.5,
                color: "#005500",
            },
        }
    }
}
