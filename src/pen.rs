/// A line segment drawn by a sprite with its pen down. The host turns these
/// into pixels; coordinates are stage coordinates (origin at the center).
#[derive(Debug, Clone, PartialEq)]
pub struct PenInstruction {
  pub size: f64,
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
  pub x1: f64,
  pub y1: f64,
  pub x2: f64,
  pub y2: f64,
}

/// Pen color in Scratch's terms. Every component runs from 0 to 100; hue
/// wraps around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenColor {
  pub hue: f64,
  pub saturation: f64,
  pub brightness: f64,
  pub transparency: f64,
}

impl PenColor {
  pub fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
    let (r, g, b) = (f64::from(r) / 255., f64::from(g) / 255., f64::from(b) / 255.);
    let max = r.max(g).max(b);
    let diff = max - r.min(g).min(b);
    let saturation = if max == 0. { 0. } else { diff / max * 100. };
    let degrees = if diff == 0. {
      0.
    } else if max == r {
      60. * ((g - b) / diff)
    } else if max == g {
      60. * ((b - r) / diff) + 120.
    } else {
      60. * ((r - g) / diff) + 240.
    };
    PenColor {
      hue: degrees.rem_euclid(360.) * 100. / 360.,
      saturation,
      brightness: max * 100.,
      transparency: (1. - f64::from(a) / 255.) * 100.,
    }
  }

  pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
    let hue = self.hue.rem_euclid(100.);
    let chroma = self.saturation / 100. * (self.brightness / 100.);
    let x = chroma * (1. - ((hue * 0.06).rem_euclid(2.) - 1.).abs());
    let m = self.brightness / 100. - chroma;
    let (r, g, b) = match hue {
      h if h < 50. / 3. => (chroma, x, 0.),
      h if h < 100. / 3. => (x, chroma, 0.),
      h if h < 50. => (0., chroma, x),
      h if h < 200. / 3. => (0., x, chroma),
      h if h < 250. / 3. => (x, 0., chroma),
      _ => (chroma, 0., x),
    };
    let channel = |value: f64| ((value + m) * 255.).round().clamp(0., 255.) as u8;
    let alpha = ((1. - self.transparency / 100.) * 255.).round().clamp(0., 255.);
    (channel(r), channel(g), channel(b), alpha as u8)
  }

  /// The Scratch 2 shade model: full-strength hue darkened towards black
  /// below 50 and lightened towards white above it. `shade` runs 0..200.
  pub fn shaded(&self, shade: f64) -> Self {
    let pure = PenColor {
      saturation: 100.,
      brightness: 100.,
      transparency: 0.,
      ..*self
    };
    let (r, g, b, _) = pure.to_rgba();
    let shade = if shade > 100. { 200. - shade } else { shade };
    let mix = |channel: u8| {
      let channel = f64::from(channel);
      let mixed = if shade < 50. {
        channel * (10. + shade) / 60.
      } else {
        channel * (1. - (shade - 50.) / 60.) + 255. * (shade - 50.) / 60.
      };
      mixed.round().clamp(0., 255.) as u8
    };
    PenColor {
      transparency: self.transparency,
      ..PenColor::from_rgba(mix(r), mix(g), mix(b), 255)
    }
  }
}

impl Default for PenColor {
  /// Scratch's blue.
  fn default() -> Self {
    PenColor {
      hue: 200. / 3.,
      saturation: 100.,
      brightness: 100.,
      transparency: 0.,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PenState {
  pub down: bool,
  pub size: f64,
  pub color: PenColor,
  /// Legacy shade (0..200) used by the `shade` blocks.
  pub shade: f64,
}

impl Default for PenState {
  fn default() -> Self {
    PenState {
      down: false,
      size: 1.,
      color: PenColor::default(),
      shade: 50.,
    }
  }
}

impl PenState {
  pub fn line(&self, from: (f64, f64), to: (f64, f64)) -> PenInstruction {
    let (r, g, b, a) = self.color.to_rgba();
    PenInstruction {
      size: self.size,
      r,
      g,
      b,
      a,
      x1: from.0,
      y1: from.1,
      x2: to.0,
      y2: to.1,
    }
  }

  /// Sets the color from a packed `0xAARRGGBB` number; a zero alpha byte
  /// means opaque.
  pub fn set_packed_color(&mut self, packed: u32) {
    let alpha = (packed >> 24) as u8;
    let alpha = if alpha == 0 { 255 } else { alpha };
    self.color = PenColor::from_rgba(
      (packed >> 16) as u8,
      (packed >> 8) as u8,
      packed as u8,
      alpha,
    );
    self.shade = self.color.brightness / 2.;
  }
}

/// Parses `#rgb` / `#rrggbb` color text into a packed color.
pub fn parse_hex_color(text: &str) -> Option<u32> {
  let digits = text.strip_prefix('#')?;
  let expanded: String = match digits.len() {
    3 => digits.chars().flat_map(|c| [c, c]).collect(),
    6 => digits.to_string(),
    _ => return None,
  };
  u32::from_str_radix(&expanded, 16).ok()
}
