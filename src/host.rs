use time::OffsetDateTime;

/// The platform around the engine: input polling and presentation. Every
/// method has a do-nothing default so hosts only implement what they support.
pub trait Host {
  /// Whether `key` (a Scratch key name such as `"space"` or `"a"`) is held.
  fn key_pressed(&self, _key: &str) -> bool {
    false
  }

  fn any_key_pressed(&self) -> bool {
    false
  }

  /// Mouse position in stage coordinates.
  fn mouse_position(&self) -> (f64, f64) {
    (0., 0.)
  }

  fn mouse_down(&self) -> bool {
    false
  }

  fn username(&self) -> String {
    String::new()
  }

  /// A sprite started or stopped talking; `None` clears its bubble.
  fn say(&mut self, _sprite: &str, _message: Option<&str>) {}

  /// `sprite` asked `question` and waits for a reply through [`Host::answer`].
  fn ask(&mut self, _sprite: &str, _question: &str) {}

  /// Polled once per tick while a question is open. `None` keeps the asking
  /// script waiting.
  fn answer(&mut self) -> Option<String> {
    Some(String::new())
  }

  /// Wall-clock time for `current` and `days since 2000`. Local time when the
  /// offset can be determined, UTC otherwise.
  fn now(&self) -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
  }
}

/// Host with no input and no output.
#[derive(Debug, Default)]
pub struct Headless;

impl Host for Headless {}
