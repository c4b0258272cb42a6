use std::{cmp::Ordering, fmt};

use serde::Deserialize;

use crate::error::{Error, Result};

/// A runtime value as seen by scripts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Bool(bool),
  Number(f64),
  Text(String),
  List(Vec<Value>),
}

impl Default for Value {
  fn default() -> Self {
    Value::Text(String::new())
  }
}

impl From<f64> for Value {
  fn from(number: f64) -> Self {
    Value::Number(number)
  }
}

impl From<bool> for Value {
  fn from(boolean: bool) -> Self {
    Value::Bool(boolean)
  }
}

impl From<String> for Value {
  fn from(text: String) -> Self {
    Value::Text(text)
  }
}

impl From<&str> for Value {
  fn from(text: &str) -> Self {
    Value::Text(text.to_string())
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl Value {
  pub fn kind(&self) -> &'static str {
    match self {
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::Text(_) => "text",
      Value::List(_) => "list",
    }
  }

  pub fn to_number(&self) -> Result<f64> {
    match self {
      Value::Number(number) if number.is_nan() => Ok(0.),
      Value::Number(number) => Ok(*number),
      Value::Bool(boolean) => Ok(if *boolean { 1. } else { 0. }),
      Value::Text(text) => Ok(parse_number(text).unwrap_or(0.)),
      Value::List(_) => Err(self.coercion("number")),
    }
  }

  pub fn to_text(&self) -> Result<String> {
    match self {
      Value::Number(number) => Ok(format_number(*number)),
      Value::Bool(boolean) => Ok(boolean.to_string()),
      Value::Text(text) => Ok(text.clone()),
      Value::List(_) => Err(self.coercion("text")),
    }
  }

  pub fn to_bool(&self) -> Result<bool> {
    match self {
      Value::Bool(boolean) => Ok(*boolean),
      Value::Number(number) => Ok(*number != 0. && !number.is_nan()),
      Value::Text(text) => {
        let lower = text.to_lowercase();
        Ok(!(lower.is_empty() || lower == "0" || lower == "false"))
      }
      Value::List(_) => Err(self.coercion("boolean")),
    }
  }

  /// Whole numbers, booleans and text without a decimal point.
  pub fn is_int(&self) -> bool {
    match self {
      Value::Number(number) => number.is_nan() || number.fract() == 0.,
      Value::Bool(_) => true,
      Value::Text(text) => !text.contains('.'),
      Value::List(_) => false,
    }
  }

  /// Scratch ordering: numeric when both sides read as numbers, otherwise a
  /// case-insensitive text comparison.
  pub fn compare(&self, other: &Value) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (self.comparable_number(), other.comparable_number())
    {
      return Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal));
    }
    let a = self.to_text()?.to_lowercase();
    let b = other.to_text()?.to_lowercase();
    Ok(a.cmp(&b))
  }

  pub fn scratch_eq(&self, other: &Value) -> Result<bool> {
    Ok(self.compare(other)? == Ordering::Equal)
  }

  fn comparable_number(&self) -> Option<f64> {
    match self {
      Value::Number(number) if number.is_nan() => None,
      Value::Number(number) => Some(*number),
      Value::Bool(boolean) => Some(if *boolean { 1. } else { 0. }),
      Value::Text(text) if text.trim().is_empty() => None,
      Value::Text(text) => parse_number(text),
      Value::List(_) => None,
    }
  }

  fn coercion(&self, to: &'static str) -> Error {
    Error::InvalidCoercion {
      from: self.kind(),
      to,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::List(items) => write!(f, "{}", list_contents(items)),
      scalar => match scalar.to_text() {
        Ok(text) => write!(f, "{text}"),
        Err(_) => Ok(()),
      },
    }
  }
}

/// Renders a list the way the list reporter does: items are joined by spaces
/// unless every item is a single character.
pub fn list_contents(items: &[Value]) -> String {
  let texts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
  let single_chars = items
    .iter()
    .zip(&texts)
    .all(|(item, text)| matches!(item, Value::Text(_)) && text.chars().count() == 1);
  if single_chars {
    texts.concat()
  } else {
    texts.join(" ")
  }
}

/// Parses text the way Scratch casts strings to numbers.
pub fn parse_number(text: &str) -> Option<f64> {
  let text = text.trim();
  match text {
    "" => return None,
    "Infinity" | "+Infinity" => return Some(f64::INFINITY),
    "-Infinity" => return Some(f64::NEG_INFINITY),
    _ => {}
  }
  let radix = match text.get(..2) {
    Some("0x") | Some("0X") => 16,
    Some("0b") | Some("0B") => 2,
    Some("0o") | Some("0O") => 8,
    _ => 10,
  };
  if radix != 10 {
    return u64::from_str_radix(&text[2..], radix)
      .ok()
      .map(|integer| integer as f64);
  }
  if !text
    .chars()
    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | 'e' | 'E' | '.'))
  {
    return None;
  }
  text.parse::<f64>().ok()
}

/// Formats a number the way JavaScript's `Number.prototype.toString` does.
pub fn format_number(number: f64) -> String {
  if number.is_nan() {
    return "NaN".to_string();
  }
  if number.is_infinite() {
    return if number > 0. {
      "Infinity".to_string()
    } else {
      "-Infinity".to_string()
    };
  }
  if number == 0. {
    return "0".to_string();
  }
  let magnitude = number.abs();
  if magnitude >= 1e21 || magnitude < 1e-6 {
    let formatted = format!("{number:e}");
    return match formatted.split_once('e') {
      Some((mantissa, exponent)) if !exponent.starts_with('-') => {
        format!("{mantissa}e+{exponent}")
      }
      _ => formatted,
    };
  }
  format!("{number}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn text_coerces_to_number() {
    assert_eq!(Value::from("12.5").to_number().unwrap(), 12.5);
    assert_eq!(Value::from("  7 ").to_number().unwrap(), 7.);
    assert_eq!(Value::from("0x10").to_number().unwrap(), 16.);
    assert_eq!(Value::from("apple").to_number().unwrap(), 0.);
    assert_eq!(Value::from("").to_number().unwrap(), 0.);
    assert_eq!(Value::from("1e").to_number().unwrap(), 0.);
    assert_eq!(Value::from("-Infinity").to_number().unwrap(), f64::NEG_INFINITY);
  }

  #[test]
  fn false_is_zero_and_false() {
    assert_eq!(Value::Bool(false).to_number().unwrap(), 0.);
    assert_eq!(Value::Bool(false).to_text().unwrap(), "false");
    assert_eq!(Value::Number(f64::NAN).to_number().unwrap(), 0.);
  }

  #[test]
  fn lists_do_not_coerce_to_scalars() {
    let list = Value::List(vec![Value::from(1.)]);
    assert!(matches!(
      list.to_number(),
      Err(Error::InvalidCoercion { from: "list", to: "number" })
    ));
    assert!(list.to_text().is_err());
    assert!(list.to_bool().is_err());
  }

  #[test]
  fn truthiness() {
    assert!(!Value::from("FALSE").to_bool().unwrap());
    assert!(!Value::from("0").to_bool().unwrap());
    assert!(Value::from("no").to_bool().unwrap());
    assert!(!Value::Number(f64::NAN).to_bool().unwrap());
  }

  #[test]
  fn numbers_format_like_javascript() {
    assert_eq!(format_number(3.), "3");
    assert_eq!(format_number(-0.), "0");
    assert_eq!(format_number(0.1), "0.1");
    assert_eq!(format_number(1e21), "1e+21");
    assert_eq!(format_number(1.5e-7), "1.5e-7");
    assert_eq!(format_number(f64::INFINITY), "Infinity");
  }

  #[test]
  fn comparison_prefers_numbers() {
    let ten = Value::from("10");
    let nine = Value::from(9.);
    assert_eq!(ten.compare(&nine).unwrap(), Ordering::Greater);
    assert!(Value::from("Apple").scratch_eq(&Value::from("apple")).unwrap());
    assert!(!Value::from(" ").scratch_eq(&Value::from(0.)).unwrap());
    assert!(Value::from("1.0").scratch_eq(&Value::from(1.)).unwrap());
  }

  #[test]
  fn list_contents_joins_items() {
    let letters = vec![Value::from("a"), Value::from("b")];
    assert_eq!(list_contents(&letters), "ab");
    let words = vec![Value::from("hello"), Value::from(2.)];
    assert_eq!(list_contents(&words), "hello 2");
  }
}
