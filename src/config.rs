use std::fmt;
use std::str::FromStr;

/// Garmin manufacturer id.
pub const GARMIN_MANUFACTURER: u16 = 1;
/// Forerunner 245 product id.
pub const FORERUNNER_245_PRODUCT: u16 = 3415;
/// Garmin Connect identifies the device model from the serial number, so the
/// default must be one it recognizes as a Forerunner 245.
pub const DEFAULT_SERIAL_NUMBER: u32 = 1_234_567_890;
pub const DEFAULT_SOFTWARE_VERSION: f64 = 3.58;

/// Identity of the device the activity file claims to come from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub manufacturer: u16,
    pub product: u16,
    pub serial_number: u32,
    pub software_version: f64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            manufacturer: GARMIN_MANUFACTURER,
            product: FORERUNNER_245_PRODUCT,
            serial_number: DEFAULT_SERIAL_NUMBER,
            software_version: DEFAULT_SOFTWARE_VERSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sport {
    Generic,
    #[default]
    Running,
    Cycling,
    Walking,
    Hiking,
    Swimming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubSport {
    #[default]
    Generic,
    Treadmill,
    Street,
    Trail,
    Track,
    Road,
    Mountain,
    IndoorCycling,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Generic,
        Sport::Running,
        Sport::Cycling,
        Sport::Walking,
        Sport::Hiking,
        Sport::Swimming,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Sport::Generic => "generic",
            Sport::Running => "running",
            Sport::Cycling => "cycling",
            Sport::Walking => "walking",
            Sport::Hiking => "hiking",
            Sport::Swimming => "swimming",
        }
    }
}

impl SubSport {
    pub const ALL: [SubSport; 8] = [
        SubSport::Generic,
        SubSport::Treadmill,
        SubSport::Street,
        SubSport::Trail,
        SubSport::Track,
        SubSport::Road,
        SubSport::Mountain,
        SubSport::IndoorCycling,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SubSport::Generic => "generic",
            SubSport::Treadmill => "treadmill",
            SubSport::Street => "street",
            SubSport::Trail => "trail",
            SubSport::Track => "track",
            SubSport::Road => "road",
            SubSport::Mountain => "mountain",
            SubSport::IndoorCycling => "indoor_cycling",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SubSport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sport {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Sport::ALL
            .into_iter()
            .find(|sport| sport.name() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "sport",
                value: s.to_string(),
            })
    }
}

impl FromStr for SubSport {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SubSport::ALL
            .into_iter()
            .find(|sub_sport| sub_sport.name() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "sub-sport",
                value: s.to_string(),
            })
    }
}

/// Caller-supplied knobs for one conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOptions {
    pub sport: Sport,
    pub sub_sport: SubSport,
    pub device: DeviceProfile,
}
