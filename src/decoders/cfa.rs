use std::fmt;

use itertools::Itertools;

pub const CFA_COLOR_R: usize = 0;
pub const CFA_COLOR_G: usize = 1;
pub const CFA_COLOR_B: usize = 2;
pub const CFA_COLOR_E: usize = 3;

const COLOR_NAMES: [char; 4] = ['R', 'G', 'B', 'E'];

/// Repeating color filter pattern over the sensor, stored row major
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CFA {
  pub width: usize,
  pub height: usize,
  pattern: Vec<usize>,
}

impl CFA {
  /// Square pattern from a string of color letters such as "RGGB".
  /// Unknown letters and non-square lengths give an empty pattern.
  pub fn new(name: &str) -> CFA {
    let colors: Option<Vec<usize>> = name.chars()
      .map(|c| COLOR_NAMES.iter().position(|&n| n == c))
      .collect();
    let size = (name.len() as f64).sqrt() as usize;
    match colors {
      Some(pattern) if size > 0 && size * size == pattern.len() => CFA {
        width: size,
        height: size,
        pattern,
      },
      _ => CFA::default(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.pattern.is_empty()
  }

  pub fn color_at(&self, row: usize, col: usize) -> usize {
    self.pattern[(row % self.height) * self.width + (col % self.width)]
  }
}

impl fmt::Display for CFA {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.pattern.iter().map(|&c| COLOR_NAMES[c]).join(""))
  }
}
