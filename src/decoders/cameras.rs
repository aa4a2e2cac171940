use std::collections::HashMap;

use serde_derive::Deserialize;

use crate::decoders::image::RawMetadata;

fn yes() -> bool {
  true
}

/// Black and white levels valid for a range of ISO values
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct Sensor {
  #[serde(default)]
  pub iso_min: u32,
  /// 0 means no upper bound
  #[serde(default)]
  pub iso_max: u32,
  pub black: u16,
  pub white: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Camera {
  pub make: String,
  pub model: String,
  /// Variant of the model, most cameras only have ""
  #[serde(default)]
  pub mode: String,
  #[serde(default)]
  pub clean_make: String,
  #[serde(default)]
  pub clean_model: String,
  #[serde(default = "yes")]
  pub supported: bool,
  /// XYZ to camera matrix, scaled by 10000
  #[serde(default)]
  pub color_matrix: Vec<i32>,
  #[serde(default)]
  pub crops: [usize; 4],
  #[serde(default)]
  pub hints: HashMap<String, String>,
  #[serde(default)]
  pub sensors: Vec<Sensor>,
}

impl Camera {
  pub fn find_hint(&self, hint: &str) -> Option<&str> {
    self.hints.get(hint).map(|v| v.as_str())
  }

  /// Sensor block for an ISO value, iso 0 takes the first one
  pub fn sensor(&self, iso: u32) -> Option<&Sensor> {
    if iso != 0 {
      let found = self.sensors.iter().find(|s| {
        iso >= s.iso_min && (s.iso_max == 0 || iso <= s.iso_max)
      });
      if found.is_some() {
        return found
      }
    }
    self.sensors.first()
  }

  pub fn apply(&self, meta: &mut RawMetadata, iso: u32) {
    meta.make = self.make.clone();
    meta.model = self.model.clone();
    meta.clean_make = self.clean_make.clone();
    meta.clean_model = self.clean_model.clone();
    meta.crops = self.crops;

    if let Some(sensor) = self.sensor(iso) {
      meta.blacklevels = [sensor.black; 4];
      meta.whitelevels = [sensor.white; 4];
    }

    for (i, val) in self.color_matrix.iter().take(12).enumerate() {
      meta.xyz_to_cam[i / 3][i % 3] = *val as f32 / 10000.0;
    }
  }
}
